//! Schema assembly
//!
//! [`SchemaBuilder`] reads the registered modules, combines their bundles,
//! translates the descriptor catalog, applies type modifications, builds the
//! root operation types, validates references and finally materializes an
//! async-graphql dynamic schema.

use crate::bundle::SchemaBundle;
use crate::catalog::DescriptorCatalog;
use crate::comments::CommentMap;
use crate::config::SchemaOptions;
use crate::context::RequestData;
use crate::error::{Error, Result};
use crate::module::SchemaModule;
use crate::naming::PLACEHOLDER_FIELD;
use crate::reader::ModuleReader;
use crate::registry::TypeRegistry;
use crate::relay::{self, NodeRegistry, NodeResolver, NODE_FIELD, NODE_INTERFACE};
use crate::resolver::Resolver;
use crate::translate::TypeTranslator;
use crate::types::{FieldDefinition, InputValueDefinition, ObjectType, TranslatedType, TypeExpr};
use async_graphql::dynamic::Schema;
use async_graphql::Value;
use prost_reflect::{DescriptorPool, FileDescriptor, MessageDescriptor};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builder for a [`DynamicSchema`]
#[derive(Default)]
pub struct SchemaBuilder {
    options: SchemaOptions,
    descriptor_sets: Vec<Vec<u8>>,
    modules: Vec<Box<dyn SchemaModule>>,
    bundles: Vec<SchemaBundle>,
    files: Vec<FileDescriptor>,
    messages: Vec<MessageDescriptor>,
    node_resolvers: Vec<NodeResolver>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a single encoded `FileDescriptorSet`, replacing earlier ones.
    pub fn with_descriptor_set_bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.descriptor_sets = vec![bytes.as_ref().to_vec()];
        self
    }

    /// Add another encoded `FileDescriptorSet`. All of its types are registered.
    pub fn add_descriptor_set_bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.descriptor_sets.push(bytes.as_ref().to_vec());
        self
    }

    pub fn with_descriptor_set_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(self.with_descriptor_set_bytes(bytes))
    }

    pub fn add_descriptor_set_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(self.add_descriptor_set_bytes(bytes))
    }

    pub fn with_query_depth_limit(mut self, max_depth: usize) -> Self {
        self.options.max_depth = Some(max_depth);
        self
    }

    pub fn with_query_complexity_limit(mut self, max_complexity: usize) -> Self {
        self.options.max_complexity = Some(max_complexity);
        self
    }

    pub fn with_options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn add_module<M>(mut self, module: M) -> Self
    where
        M: SchemaModule + 'static,
    {
        self.modules.push(Box::new(module));
        self
    }

    /// Add a pre-assembled bundle.
    pub fn add_bundle(mut self, bundle: SchemaBundle) -> Self {
        self.bundles.push(bundle);
        self
    }

    /// Register the types of a descriptor file and its dependencies.
    pub fn add_file(mut self, file: FileDescriptor) -> Self {
        self.files.push(file);
        self
    }

    pub fn add_message(mut self, descriptor: MessageDescriptor) -> Self {
        self.messages.push(descriptor);
        self
    }

    pub fn add_node_resolver(mut self, resolver: NodeResolver) -> Self {
        self.node_resolvers.push(resolver);
        self
    }

    pub fn build(self) -> Result<DynamicSchema> {
        let SchemaBuilder {
            mut options,
            descriptor_sets,
            modules,
            bundles,
            files,
            messages,
            node_resolvers,
        } = self;

        let reader = ModuleReader::new(&options);
        let mut read = Vec::with_capacity(modules.len() + bundles.len());
        for module in &modules {
            read.push(reader.read(module.as_ref())?);
        }
        read.extend(bundles);
        let mut bundle = SchemaBundle::combine(read)?;
        for resolver in node_resolvers {
            bundle.add_node_resolver(resolver);
        }

        let mut catalog = DescriptorCatalog::builder()
            .add_files(bundle.files().cloned())
            .add_files(files);
        for bytes in &descriptor_sets {
            let pool = DescriptorPool::decode(bytes.as_slice())?;
            catalog = catalog.add_pool(&pool);
        }
        for message in messages {
            catalog = catalog.add_message(message);
        }
        let catalog = catalog.build()?;

        // Comments found in the descriptors; explicitly supplied ones win
        let mut comments = CommentMap::from_files(catalog.files().cloned());
        comments.extend(std::mem::take(&mut options.comments));
        options.comments = comments;

        let mut registry = TypeTranslator::new(&options).translate(&catalog)?;
        for group in bundle.query_groups.values().chain(bundle.mutation_groups.values()) {
            registry.insert(TranslatedType::Object(group.clone()))?;
        }
        registry.apply_modifications(&bundle.modifications)?;

        let node_types: Vec<String> = registry
            .objects()
            .filter(|object| object.implements(NODE_INTERFACE))
            .map(|object| object.name.clone())
            .collect();
        for type_name in &node_types {
            if !bundle.node_resolvers.contains(type_name) {
                warn!(type_name = %type_name, "Node type has no node resolver");
            }
        }
        if !node_types.is_empty() {
            registry.insert(TranslatedType::Interface(relay::node_interface()))?;
        }

        let mut query = root_type(
            &options.query_type_name,
            &bundle.query_fields,
            &bundle.query_groups,
            (!node_types.is_empty()).then(|| node_field(bundle.node_resolvers.clone())),
        )?;
        let query_fields = query.fields.len();
        if query.fields.is_empty() {
            // GraphQL requires at least one query field
            query.fields.push(
                FieldDefinition::with_value(PLACEHOLDER_FIELD, TypeExpr::named("String"), "-")
                    .description("Placeholder for a schema without queries"),
            );
        }
        registry.insert(TranslatedType::Object(query))?;

        let mutation = root_type(
            &options.mutation_type_name,
            &bundle.mutation_fields,
            &bundle.mutation_groups,
            None,
        )?;
        let mutation_fields = mutation.fields.len();
        let has_mutation = !mutation.fields.is_empty();
        if has_mutation {
            registry.insert(TranslatedType::Object(mutation))?;
        }

        registry.validate_references()?;

        if options.prune_unreachable_types {
            let mut roots = vec![options.query_type_name.as_str()];
            if has_mutation {
                roots.push(options.mutation_type_name.as_str());
            }
            registry.prune_unreachable(&roots);
        }

        let inner = materialize(&registry, &options, has_mutation)?;
        info!(
            types = registry.len(),
            query_fields,
            mutation_fields,
            node_types = node_types.len(),
            "Built GraphQL schema"
        );
        Ok(DynamicSchema {
            inner,
            types: Arc::new(registry),
        })
    }
}

fn node_field(resolvers: NodeRegistry) -> FieldDefinition {
    FieldDefinition::new(
        NODE_FIELD,
        TypeExpr::named(NODE_INTERFACE),
        Resolver::Node(Arc::new(resolvers)),
    )
    .argument(InputValueDefinition::new("id", TypeExpr::named_nn("ID")))
    .description("Fetch any object by its global id")
}

/// Root operation type from top-level fields, one field per namespace group
/// and the optional node field.
fn root_type(
    name: &str,
    fields: &[FieldDefinition],
    groups: &async_graphql::indexmap::IndexMap<String, ObjectType>,
    node: Option<FieldDefinition>,
) -> Result<ObjectType> {
    let mut root = ObjectType::new(name);
    let group_fields = groups.iter().map(|(namespace, group)| {
        FieldDefinition::with_value(
            namespace.clone(),
            TypeExpr::named_nn(group.name.clone()),
            Value::Object(Default::default()),
        )
    });
    for field in fields.iter().cloned().chain(group_fields).chain(node) {
        if root.has_field(&field.name) {
            return Err(Error::FieldConflict {
                type_name: name.to_string(),
                field_name: field.name,
            });
        }
        debug!(root = %name, field = %field.name, ty = %field.ty, "Added root field");
        root.fields.push(field);
    }
    Ok(root)
}

fn materialize(registry: &TypeRegistry, options: &SchemaOptions, has_mutation: bool) -> Result<Schema> {
    let mutation = has_mutation.then_some(options.mutation_type_name.as_str());
    let mut builder = Schema::build(&options.query_type_name, mutation, None);

    for ty in registry.types() {
        builder = match ty {
            TranslatedType::Scalar(scalar) => builder.register(scalar.to_dynamic()),
            TranslatedType::Object(object) => builder.register(object.to_dynamic()),
            TranslatedType::Interface(interface) => builder.register(interface.to_dynamic()),
            TranslatedType::Enum(enumeration) => builder.register(enumeration.to_dynamic()),
            TranslatedType::InputObject(input) => builder.register(input.to_dynamic()),
        };
    }

    if let Some(depth) = options.max_depth {
        builder = builder.limit_depth(depth);
    }
    if let Some(complexity) = options.max_complexity {
        builder = builder.limit_complexity(complexity);
    }
    if !options.introspection {
        builder = builder.disable_introspection();
    }
    builder.finish().map_err(|e| Error::Schema(e.to_string()))
}

/// A built schema and the type graph it was materialized from
#[derive(Clone)]
pub struct DynamicSchema {
    inner: Schema,
    types: Arc<TypeRegistry>,
}

impl DynamicSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub async fn execute(&self, request: impl Into<async_graphql::Request>) -> async_graphql::Response {
        self.inner.execute(request).await
    }

    /// Execute with host values visible to resolvers through [`crate::RequestContext`].
    pub async fn execute_with_data(
        &self,
        request: impl Into<async_graphql::Request>,
        data: RequestData,
    ) -> async_graphql::Response {
        self.inner.execute(request.into().data(data)).await
    }

    pub fn sdl(&self) -> String {
        self.inner.sdl()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn inner(&self) -> &Schema {
        &self.inner
    }
}

impl std::fmt::Debug for DynamicSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicSchema")
            .field("types", &self.types.len())
            .finish()
    }
}
