//! Module reader
//!
//! Turns the [`Definition`]s of a [`SchemaModule`] into a [`SchemaBundle`].
//! Every shape problem (unsupported return types or parameters, node methods
//! not returning a message, clashing argument names, unknown service methods)
//! surfaces here, so a schema that builds never fails on a malformed
//! declaration at request time.

use crate::bundle::SchemaBundle;
use crate::config::SchemaOptions;
use crate::error::{Error, Result};
use crate::input::InputConverter;
use crate::modification::ModifiableType;
use crate::module::{Definition, Method, Operation, Param, ReturnType, SchemaModule};
use crate::naming;
use crate::relay::NodeResolver;
use crate::resolver::{BoundMethod, BoundParam, Resolver};
use crate::translate::ScalarMapping;
use crate::types::{FieldDefinition, InputValueDefinition, TypeExpr};
use prost_reflect::{Kind, MessageDescriptor};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub struct ModuleReader<'a> {
    options: &'a SchemaOptions,
    scalars: ScalarMapping,
}

impl<'a> ModuleReader<'a> {
    pub fn new(options: &'a SchemaOptions) -> Self {
        Self {
            options,
            scalars: ScalarMapping::new(options.use_proto_scalar_types),
        }
    }

    /// Read every definition of `module`.
    pub fn read(&self, module: &dyn SchemaModule) -> Result<SchemaBundle> {
        let mut bundle = SchemaBundle::new();
        let namespace = module.namespace();

        for definition in module.definitions()? {
            match definition {
                Definition::Query { name, method } => {
                    self.root_method(&mut bundle, Operation::Query, namespace, &name, &method)?;
                }
                Definition::Mutation { name, method } => {
                    self.root_method(&mut bundle, Operation::Mutation, namespace, &name, &method)?;
                }
                Definition::Service(service) => {
                    for (name, method) in service.expand()? {
                        self.root_method(&mut bundle, service.operation(), namespace, &name, &method)?;
                    }
                }
                Definition::QueryField(field) => match namespace {
                    Some(ns) => bundle.add_query_group_field(ns, field)?,
                    None => bundle.add_query_field(field),
                },
                Definition::MutationField(field) => match namespace {
                    Some(ns) => bundle.add_mutation_group_field(ns, field)?,
                    None => bundle.add_mutation_field(field),
                },
                Definition::Modification(modification) => bundle.add_modification(modification),
                Definition::Extend { on, field, method } => {
                    let path = format!("{}.{}", naming::reference_name(&on), field);
                    let definition = self.method_field(&mut bundle, &field, &path, &method, Some(&on))?;
                    bundle.add_file(on.parent_file());
                    bundle.add_modification(ModifiableType::of(&on).add_field(definition));
                }
                Definition::Node(method) => {
                    let ReturnType::Message(output) = method.returns.unwrapped() else {
                        return Err(Error::UnsupportedReturnType(format!(
                            "node method of module '{}' must return a message",
                            module.name()
                        )));
                    };
                    let type_name = naming::reference_name(output);
                    let path = format!("node({})", type_name);
                    let params = self.bind_params(&mut bundle, &path, &method, None)?.0;
                    bundle.add_file(output.parent_file());
                    bundle.add_node_resolver(NodeResolver::from_method(
                        type_name,
                        Arc::new(bound_method(path, params, &method)),
                    ));
                }
                Definition::ExtraTypes(file) => bundle.add_file(file),
            }
        }

        debug!(
            module = %module.name(),
            namespace = ?namespace,
            query_fields = bundle.query_field_count(),
            mutation_fields = bundle.mutation_field_count(),
            modifications = bundle.modifications().len(),
            node_resolvers = bundle.node_resolvers().len(),
            "Read schema module"
        );
        Ok(bundle)
    }

    /// Schema type of a declared return shape.
    pub fn return_type(&self, returns: &ReturnType) -> Result<TypeExpr> {
        match returns.unwrapped() {
            ReturnType::Message(descriptor) => Ok(TypeExpr::named(naming::reference_name(descriptor))),
            ReturnType::List(inner) => match inner.unwrapped() {
                ReturnType::Message(descriptor) => Ok(TypeExpr::list(TypeExpr::named_nn(
                    naming::reference_name(descriptor),
                ))),
                other => Err(Error::UnsupportedReturnType(format!(
                    "lists may only hold messages, got {:?}",
                    other
                ))),
            },
            ReturnType::Scalar(Kind::Message(descriptor)) => Err(Error::UnsupportedReturnType(format!(
                "message '{}' declared as a scalar return",
                descriptor.full_name()
            ))),
            ReturnType::Scalar(kind) => Ok(TypeExpr::named(self.scalars.type_name(kind).into_owned())),
            ReturnType::Deferred(inner) => self.return_type(inner),
        }
    }

    fn root_method(
        &self,
        bundle: &mut SchemaBundle,
        operation: Operation,
        namespace: Option<&str>,
        name: &str,
        method: &Method,
    ) -> Result<()> {
        let root = match operation {
            Operation::Query => &self.options.query_type_name,
            Operation::Mutation => &self.options.mutation_type_name,
        };
        let path = field_path(root, namespace, name);
        let field = self.method_field(bundle, name, &path, method, None)?;
        match (operation, namespace) {
            (Operation::Query, Some(ns)) => bundle.add_query_group_field(ns, field),
            (Operation::Query, None) => {
                bundle.add_query_field(field);
                Ok(())
            }
            (Operation::Mutation, Some(ns)) => bundle.add_mutation_group_field(ns, field),
            (Operation::Mutation, None) => {
                bundle.add_mutation_field(field);
                Ok(())
            }
        }
    }

    fn method_field(
        &self,
        bundle: &mut SchemaBundle,
        name: &str,
        path: &str,
        method: &Method,
        extends: Option<&MessageDescriptor>,
    ) -> Result<FieldDefinition> {
        let ty = self.return_type(&method.returns)?;
        if let Some(output) = method.returns.message_descriptor() {
            bundle.add_file(output.parent_file());
        }
        if let ReturnType::Scalar(Kind::Enum(enumeration)) = method.returns.unwrapped() {
            bundle.add_file(enumeration.parent_file());
        }

        let (params, arguments) = self.bind_params(bundle, path, method, extends)?;
        let mut field = FieldDefinition::new(
            name,
            ty,
            Resolver::Method(Arc::new(bound_method(path.to_string(), params, method))),
        );
        field.arguments = arguments;
        if let Some(description) = &method.description {
            field = field.description(description.clone());
        }
        if let Some(reason) = &method.deprecation {
            field = field.deprecation(reason.clone());
        }
        Ok(field)
    }

    fn bind_params(
        &self,
        bundle: &mut SchemaBundle,
        path: &str,
        method: &Method,
        extends: Option<&MessageDescriptor>,
    ) -> Result<(Vec<BoundParam>, Vec<InputValueDefinition>)> {
        let mut params = Vec::with_capacity(method.params.len());
        let mut arguments = Vec::new();
        let mut argument_names = HashSet::new();

        for param in &method.params {
            match param {
                Param::Input { descriptor, .. } if extends == Some(descriptor) => {
                    params.push(BoundParam::Source(descriptor.clone()));
                }
                Param::Input { name, descriptor } => {
                    claim(&mut argument_names, name, path)?;
                    bundle.add_file(descriptor.parent_file());
                    arguments.push(InputConverter::argument(name, descriptor));
                    params.push(BoundParam::Input {
                        name: name.clone(),
                        descriptor: descriptor.clone(),
                    });
                }
                Param::Argument { name, kind } => {
                    claim(&mut argument_names, name, path)?;
                    match kind {
                        Kind::Message(descriptor) => {
                            return Err(Error::UnsupportedParameter(format!(
                                "argument '{}' of '{}' has message type '{}'; declare it as an input",
                                name,
                                path,
                                descriptor.full_name()
                            )))
                        }
                        Kind::Enum(enumeration) => bundle.add_file(enumeration.parent_file()),
                        _ => {}
                    }
                    let ty = TypeExpr::named(self.scalars.type_name(kind).into_owned());
                    arguments.push(InputValueDefinition::new(name.clone(), ty));
                    params.push(BoundParam::Argument {
                        name: name.clone(),
                        kind: kind.clone(),
                    });
                }
                Param::Context => params.push(BoundParam::Context),
                Param::Provided(provider) => params.push(BoundParam::Provided(provider.clone())),
            }
        }
        Ok((params, arguments))
    }
}

fn claim(names: &mut HashSet<String>, name: &str, path: &str) -> Result<()> {
    if names.insert(name.to_string()) {
        Ok(())
    } else {
        Err(Error::UnsupportedParameter(format!(
            "argument '{}' declared twice on '{}'",
            name, path
        )))
    }
}

fn field_path(root: &str, namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}.{}.{}", root, ns, name),
        None => format!("{}.{}", root, name),
    }
}

fn bound_method(field_path: String, params: Vec<BoundParam>, method: &Method) -> BoundMethod {
    BoundMethod {
        field_path,
        params,
        returns: method.returns.clone(),
        handler: method.handler.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::module::{DeclaredModule, Resolved};
    use crate::modification::ModificationOp;

    fn method(returns: ReturnType) -> Method {
        Method::new(returns, |_| Ok(Resolved::null()))
    }

    fn read(module: DeclaredModule) -> Result<SchemaBundle> {
        let options = SchemaOptions::default();
        ModuleReader::new(&options).read(&module)
    }

    #[test]
    fn test_query_and_mutation_fields() {
        let module = DeclaredModule::new("books")
            .query(
                "getBook",
                method(ReturnType::message(fixtures::book()))
                    .param(Param::input(fixtures::message_descriptor("GetBookRequest")))
                    .description("Look up one book"),
            )
            .query(
                "listBooks",
                method(ReturnType::list_of(fixtures::book()).deferred())
                    .param(Param::argument("authorName", Kind::String))
                    .param(Param::argument("genre", Kind::Enum(fixtures::genre())))
                    .param(Param::context()),
            )
            .mutation("deleteBook", method(ReturnType::scalar(Kind::Bool)).deprecation("use archiveBook"));

        let bundle = read(module).unwrap();
        let fields = bundle.query_fields();
        assert_eq!(fields.len(), 2);

        assert_eq!(fields[0].ty.to_string(), "library_v1_Book");
        assert_eq!(fields[0].arguments[0].name, "input");
        assert_eq!(
            fields[0].arguments[0].ty.to_string(),
            "Input_library_v1_GetBookRequest"
        );
        assert_eq!(fields[0].description.as_deref(), Some("Look up one book"));

        assert_eq!(fields[1].ty.to_string(), "[library_v1_Book!]");
        let args: Vec<String> = fields[1]
            .arguments
            .iter()
            .map(|a| format!("{}: {}", a.name, a.ty))
            .collect();
        assert_eq!(args, vec!["authorName: String", "genre: library_v1_Genre"]);

        let mutation = &bundle.mutation_fields()[0];
        assert_eq!(mutation.ty.to_string(), "Boolean");
        assert_eq!(mutation.deprecation.as_deref(), Some("use archiveBook"));
        assert!(matches!(
            &mutation.resolver,
            Resolver::Method(bound) if bound.field_path == "Mutation.deleteBook"
        ));

        let files: Vec<&str> = bundle.files().map(|f| f.name()).collect();
        assert!(files.contains(&"library/v1/book.proto"));
        assert!(files.contains(&"library/v1/common.proto"));
    }

    #[test]
    fn test_unsupported_return_types() {
        let scalar_list = DeclaredModule::new("bad").query(
            "tags",
            method(ReturnType::List(Box::new(ReturnType::scalar(Kind::String)))),
        );
        assert!(matches!(read(scalar_list), Err(Error::UnsupportedReturnType(_))));

        let nested = DeclaredModule::new("bad").query(
            "shelves",
            method(ReturnType::List(Box::new(ReturnType::list_of(fixtures::book())))),
        );
        assert!(matches!(read(nested), Err(Error::UnsupportedReturnType(_))));
    }

    #[test]
    fn test_message_argument_rejected() {
        let module = DeclaredModule::new("bad").query(
            "getBook",
            method(ReturnType::message(fixtures::book()))
                .param(Param::argument("request", Kind::Message(fixtures::message_descriptor("GetBookRequest")))),
        );
        let err = read(module).unwrap_err();
        assert!(matches!(err, Error::UnsupportedParameter(_)));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_duplicate_argument_names() {
        let module = DeclaredModule::new("bad").query(
            "getBook",
            method(ReturnType::message(fixtures::book()))
                .param(Param::argument("id", Kind::String))
                .param(Param::argument("id", Kind::Int32)),
        );
        assert!(matches!(read(module), Err(Error::UnsupportedParameter(_))));
    }

    #[test]
    fn test_extend_binds_source() {
        let book = fixtures::book();
        let module = DeclaredModule::new("reviews").extend(
            book.clone(),
            "reviews",
            method(ReturnType::list_of(fixtures::message_descriptor("Review")))
                .param(Param::input(book))
                .param(Param::argument("limit", Kind::Int32)),
        );
        let bundle = read(module).unwrap();
        assert!(bundle.query_fields().is_empty());

        let modification = &bundle.modifications()[0];
        assert_eq!(modification.type_name(), "library_v1_Book");
        let ModificationOp::AddField(field) = modification.op() else {
            panic!("expected AddField, got {:?}", modification.op());
        };
        assert_eq!(field.name, "reviews");
        assert_eq!(field.ty.to_string(), "[library_v1_Review!]");
        assert_eq!(field.arguments.len(), 1);
        assert_eq!(field.arguments[0].name, "limit");
        let Resolver::Method(bound) = &field.resolver else {
            panic!("expected a method resolver");
        };
        assert!(matches!(bound.params[0], BoundParam::Source(_)));
        assert_eq!(bound.field_path, "library_v1_Book.reviews");
    }

    #[test]
    fn test_node_methods() {
        let module = DeclaredModule::new("books").node(
            method(ReturnType::message(fixtures::book()).deferred())
                .param(Param::input(fixtures::message_descriptor("GetBookRequest"))),
        );
        let bundle = read(module).unwrap();
        assert!(bundle.node_resolvers().contains("library_v1_Book"));

        let bad = DeclaredModule::new("books").node(method(ReturnType::list_of(fixtures::book())));
        assert!(matches!(read(bad), Err(Error::UnsupportedReturnType(_))));
    }

    #[test]
    fn test_namespaced_module() {
        let module = DeclaredModule::new("books")
            .namespace("library")
            .query("getBook", method(ReturnType::message(fixtures::book())))
            .query("listBooks", method(ReturnType::list_of(fixtures::book())))
            .mutation("deleteBook", method(ReturnType::scalar(Kind::Bool)));
        let bundle = read(module).unwrap();

        assert!(bundle.query_fields().is_empty());
        let group = &bundle.query_groups()["library"];
        assert_eq!(group.name, "QueryGroup_library");
        assert_eq!(group.field_names(), vec!["getBook", "listBooks"]);
        assert_eq!(bundle.mutation_groups()["library"].name, "MutationGroup_library");
        assert!(matches!(
            &group.fields[0].resolver,
            Resolver::Method(bound) if bound.field_path == "Query.library.getBook"
        ));
    }

    #[test]
    fn test_service_methods_become_root_fields() {
        let module = DeclaredModule::new("library")
            .namespace("shelf")
            .service_queries(fixtures::library_service(), ["GetBook", "ListBooks"], |_, _| {
                Ok(Resolved::null())
            })
            .service_mutations(fixtures::library_service(), ["deleteBook"], |_, _| {
                Ok(Resolved::null())
            });
        let bundle = read(module).unwrap();

        let group = &bundle.query_groups()["shelf"];
        assert_eq!(group.field_names(), vec!["getBook", "listBooks"]);
        assert_eq!(group.fields[1].ty.to_string(), "library_v1_ListBooksResponse");
        assert_eq!(
            group.fields[1].arguments[0].ty.to_string(),
            "Input_library_v1_ListBooksRequest"
        );
        let delete = &bundle.mutation_groups()["shelf"].fields[0];
        assert_eq!(delete.ty.to_string(), "library_v1_Empty");
        assert!(matches!(
            &delete.resolver,
            Resolver::Method(bound) if bound.field_path == "Mutation.shelf.deleteBook"
        ));
    }

    #[test]
    fn test_unknown_service_method() {
        let module = DeclaredModule::new("library").service_queries(
            fixtures::library_service(),
            ["getShelf"],
            |_, _| Ok(Resolved::null()),
        );
        assert!(matches!(read(module).unwrap_err(), Error::Schema(_)));
    }

    #[test]
    fn test_extra_types_recorded() {
        let orphan = fixtures::pool()
            .get_message_by_name("misc.v1.Orphan")
            .unwrap();
        let bundle = read(DeclaredModule::new("misc").extra_types(orphan.parent_file())).unwrap();
        let files: Vec<&str> = bundle.files().map(|f| f.name()).collect();
        assert_eq!(files, vec!["misc/v1/misc.proto"]);
    }
}
