//! Field resolvers
//!
//! Every field of the translated graph carries a [`Resolver`]. Message
//! fields read their parent [`DynamicMessage`], method-backed fields bind
//! their parameters from the request and run the module's handler, and the
//! relay fields encode or decode global ids.

use crate::context::{argument_map, RequestContext};
use crate::error::{Error, Result};
use crate::input::{convert_value, create_message};
use crate::module::{Handler, MethodArgs, ParamValue, Payload, Provider, Resolved, ReturnType};
use crate::relay::{self, NodeRegistry};
use crate::value::{map_key_to_string, prost_value_to_graphql, scalar_to_string};
use async_graphql::dynamic::{Field, FieldFuture, FieldValue, ResolverContext, TypeRef};
use async_graphql::indexmap::IndexMap;
use async_graphql::{ErrorExtensions, Name, Value};
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, ReflectMessage};
use std::sync::Arc;
use tracing::debug;

/// Raw async-graphql resolver function
pub type ResolverFn = Arc<dyn for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync>;

#[derive(Clone)]
pub enum Resolver {
    /// Reads a field of the parent message
    ProtoField(FieldDescriptor),
    /// Relay `id` built from a field of the parent message
    GlobalId {
        type_name: String,
        field: FieldDescriptor,
    },
    Static(Value),
    Method(Arc<BoundMethod>),
    /// Root `node(id)` lookup
    Node(Arc<NodeRegistry>),
    Custom(ResolverFn),
}

impl Resolver {
    pub fn custom<F>(resolver_fn: F) -> Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        Resolver::Custom(Arc::new(resolver_fn))
    }

    pub(crate) fn to_field(&self, name: &str, ty: TypeRef) -> Field {
        match self.clone() {
            Resolver::ProtoField(field) => Field::new(name, ty, move |ctx| {
                let field = field.clone();
                FieldFuture::new(async move {
                    let parent = parent_message(&ctx)?;
                    proto_field_value(parent, &field).map_err(|e| e.extend())
                })
            }),
            Resolver::GlobalId { type_name, field } => Field::new(name, ty, move |ctx| {
                let type_name = type_name.clone();
                let field = field.clone();
                FieldFuture::new(async move {
                    let parent = parent_message(&ctx)?;
                    let raw_id = scalar_to_string(&parent.get_field(&field)).ok_or_else(|| {
                        Error::Resolver(format!("relay id field '{}' is not a scalar", field.full_name()))
                            .extend()
                    })?;
                    Ok(Some(FieldValue::value(Value::String(relay::encode_global_id(
                        &type_name, &raw_id,
                    )))))
                })
            }),
            Resolver::Static(value) => Field::new(name, ty, move |_| {
                let value = value.clone();
                FieldFuture::new(async move { Ok(Some(FieldValue::value(value))) })
            }),
            Resolver::Method(method) => Field::new(name, ty, move |ctx| {
                let method = method.clone();
                FieldFuture::new(async move {
                    let resolved = method.start(&ctx).map_err(|e| e.extend())?;
                    let payload = method.finish(resolved).await.map_err(|e| e.extend())?;
                    Ok(payload_to_field_value(payload))
                })
            }),
            Resolver::Node(registry) => Field::new(name, ty, move |ctx| {
                let registry = registry.clone();
                FieldFuture::new(async move { registry.resolve(ctx).await.map_err(|e| e.extend()) })
            }),
            Resolver::Custom(resolver_fn) => Field::new(name, ty, move |ctx| resolver_fn(ctx)),
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolver::ProtoField(field) => write!(f, "ProtoField({})", field.full_name()),
            Resolver::GlobalId { type_name, field } => {
                write!(f, "GlobalId({}, {})", type_name, field.full_name())
            }
            Resolver::Static(value) => write!(f, "Static({})", value),
            Resolver::Method(method) => write!(f, "Method({})", method.field_path),
            Resolver::Node(registry) => write!(f, "Node({} types)", registry.len()),
            Resolver::Custom(_) => write!(f, "Custom"),
        }
    }
}

fn parent_message<'a>(ctx: &'a ResolverContext<'_>) -> async_graphql::Result<&'a DynamicMessage> {
    ctx.parent_value.downcast_ref::<DynamicMessage>().ok_or_else(|| {
        Error::Resolver(format!("field '{}' resolved without a parent message", ctx.ctx.field().name()))
            .extend()
    })
}

/// Value of `field` on `parent` in the shape the schema declares.
fn proto_field_value<'a>(parent: &DynamicMessage, field: &FieldDescriptor) -> Result<Option<FieldValue<'a>>> {
    if field.is_map() {
        return map_entries(parent, field).map(|entries| {
            Some(FieldValue::list(entries.into_iter().map(FieldValue::owned_any)))
        });
    }

    match field.kind() {
        Kind::Message(_) if field.is_list() => {
            let value = parent.get_field(field);
            let items = value
                .as_list()
                .unwrap_or_default()
                .iter()
                .filter_map(|item| item.as_message().cloned())
                .map(FieldValue::owned_any)
                .collect::<Vec<_>>();
            Ok(Some(FieldValue::list(items)))
        }
        Kind::Message(_) => {
            if !parent.has_field(field) {
                return Ok(None);
            }
            Ok(parent
                .get_field(field)
                .as_message()
                .cloned()
                .map(FieldValue::owned_any))
        }
        kind => {
            let value = prost_value_to_graphql(&parent.get_field(field), &kind)?;
            Ok(Some(FieldValue::value(value)))
        }
    }
}

/// Map field as entry messages sorted by key.
fn map_entries(parent: &DynamicMessage, field: &FieldDescriptor) -> Result<Vec<DynamicMessage>> {
    let entry_descriptor = field
        .kind()
        .as_message()
        .cloned()
        .ok_or_else(|| Error::Schema(format!("map field '{}' without entry type", field.full_name())))?;
    let key_field = entry_descriptor.map_entry_key_field();
    let value_field = entry_descriptor.map_entry_value_field();

    let value = parent.get_field(field);
    let Some(map) = value.as_map() else {
        return Ok(Vec::new());
    };
    let mut sorted: Vec<_> = map.iter().collect();
    sorted.sort_by_key(|(key, _)| map_key_to_string(key));

    sorted
        .into_iter()
        .map(|(key, value)| {
            let mut entry = DynamicMessage::new(entry_descriptor.clone());
            entry
                .try_set_field(&key_field, key.clone().into())
                .and_then(|_| entry.try_set_field(&value_field, value.clone()))
                .map_err(|e| Error::Resolver(format!("map field '{}': {}", field.full_name(), e)))?;
            Ok(entry)
        })
        .collect()
}

fn payload_to_field_value<'a>(payload: Payload) -> Option<FieldValue<'a>> {
    match payload {
        Payload::Null => None,
        Payload::Message(message) => Some(FieldValue::owned_any(message)),
        Payload::List(items) => Some(FieldValue::list(
            items
                .into_iter()
                .map(|item| payload_to_field_value(item).unwrap_or(FieldValue::NULL)),
        )),
        Payload::Value(value) => Some(FieldValue::value(value)),
    }
}

/// Parameter after module reading
#[derive(Clone)]
pub(crate) enum BoundParam {
    Input {
        name: String,
        descriptor: MessageDescriptor,
    },
    /// Parent message of an extended type
    Source(MessageDescriptor),
    Argument {
        name: String,
        kind: Kind,
    },
    Context,
    Provided(Provider),
}

/// A method bound to one schema field
pub struct BoundMethod {
    pub(crate) field_path: String,
    pub(crate) params: Vec<BoundParam>,
    pub(crate) returns: ReturnType,
    pub(crate) handler: Handler,
}

impl BoundMethod {
    fn needs_request(&self) -> bool {
        self.params
            .iter()
            .any(|param| matches!(param, BoundParam::Context | BoundParam::Provided(_)))
    }

    /// Bind from the resolver's arguments and parent value, then call the handler.
    pub(crate) fn start(&self, ctx: &ResolverContext<'_>) -> Result<Resolved> {
        let arguments = argument_map(ctx);
        let source = ctx.parent_value.downcast_ref::<DynamicMessage>();
        self.start_with(ctx, &arguments, source)
    }

    pub(crate) fn start_with(
        &self,
        ctx: &ResolverContext<'_>,
        arguments: &IndexMap<Name, Value>,
        source: Option<&DynamicMessage>,
    ) -> Result<Resolved> {
        let request = self.needs_request().then(|| RequestContext::from_resolver(ctx));
        let args = self.bind(arguments, source, request.as_ref())?;
        debug!(field = %self.field_path, params = args.len(), "Invoking method");
        (self.handler)(args)
    }

    /// Await the handler's result and check it against the declared type.
    pub(crate) async fn finish(&self, resolved: Resolved) -> Result<Payload> {
        let payload = resolved.into_payload().await?;
        self.returns.check(&payload)?;
        Ok(payload)
    }

    pub(crate) fn bind(
        &self,
        arguments: &IndexMap<Name, Value>,
        source: Option<&DynamicMessage>,
        request: Option<&RequestContext>,
    ) -> Result<MethodArgs> {
        let mut values = Vec::with_capacity(self.params.len());
        for param in &self.params {
            let value = match param {
                BoundParam::Input { name, descriptor } => match arguments.get(name.as_str()) {
                    Some(Value::Object(input)) => ParamValue::Message(create_message(descriptor, input)?),
                    None | Some(Value::Null) => ParamValue::Message(DynamicMessage::new(descriptor.clone())),
                    Some(other) => {
                        return Err(Error::InvalidRequest(format!(
                            "argument '{}' must be an input object, got {}",
                            name, other
                        )))
                    }
                },
                BoundParam::Source(descriptor) => {
                    let parent = source
                        .filter(|message| &message.descriptor() == descriptor)
                        .ok_or_else(|| {
                            Error::Resolver(format!(
                                "'{}' resolved without a '{}' parent",
                                self.field_path,
                                descriptor.full_name()
                            ))
                        })?;
                    ParamValue::Source(parent.clone())
                }
                BoundParam::Argument { name, kind } => match arguments.get(name.as_str()) {
                    None | Some(Value::Null) => ParamValue::Value(None),
                    Some(value) => ParamValue::Value(Some(convert_value(kind, value, name)?)),
                },
                BoundParam::Context => ParamValue::Context(request.cloned().unwrap_or_default()),
                BoundParam::Provided(provider) => {
                    let fallback = RequestContext::default();
                    ParamValue::Provided(provider(request.unwrap_or(&fallback))?)
                }
            };
            values.push(value);
        }
        Ok(MethodArgs::new(values))
    }

    /// Arguments feeding a raw id to a node method.
    pub(crate) fn node_arguments(&self, raw_id: &str) -> IndexMap<Name, Value> {
        let mut arguments = IndexMap::new();
        for param in &self.params {
            match param {
                BoundParam::Input { name, descriptor } if descriptor.get_field_by_name("id").is_some() => {
                    arguments.insert(Name::new(name), relay::raw_id_input(raw_id));
                }
                BoundParam::Argument { name, .. } if name == "id" => {
                    arguments.insert(Name::new(name), Value::String(raw_id.to_string()));
                }
                _ => {}
            }
        }
        arguments
    }
}

impl std::fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundMethod")
            .field("field_path", &self.field_path)
            .field("params", &self.params.len())
            .field("returns", &self.returns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use serde_json::json;

    fn method(params: Vec<BoundParam>, returns: ReturnType) -> BoundMethod {
        BoundMethod {
            field_path: "Query.test".to_string(),
            params,
            returns,
            handler: Arc::new(|args: MethodArgs| Ok::<_, Error>(Resolved::value(args.len() as i32))),
        }
    }

    fn arguments(value: serde_json::Value) -> IndexMap<Name, Value> {
        match Value::from_json(value).unwrap() {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_bind_input_and_argument() {
        let request = fixtures::message_descriptor("ListBooksRequest");
        let bound = method(
            vec![
                BoundParam::Input {
                    name: "input".into(),
                    descriptor: request,
                },
                BoundParam::Argument {
                    name: "limit".into(),
                    kind: Kind::Int32,
                },
                BoundParam::Argument {
                    name: "missing".into(),
                    kind: Kind::String,
                },
            ],
            ReturnType::scalar(Kind::Int32),
        );
        let args = bound
            .bind(
                &arguments(json!({"input": {"authorName": "Le Guin", "genre": "FICTION"}, "limit": "5"})),
                None,
                None,
            )
            .unwrap();

        let input = args.message(0).unwrap();
        assert_eq!(
            input.get_field_by_name("author_name").unwrap().as_str(),
            Some("Le Guin")
        );
        assert_eq!(input.get_field_by_name("genre").unwrap().as_enum_number(), Some(1));
        assert_eq!(args.value(1).unwrap(), Some(&prost_reflect::Value::I32(5)));
        assert_eq!(args.value(2).unwrap(), None);
    }

    #[test]
    fn test_bind_omitted_input_is_empty_message() {
        let request = fixtures::message_descriptor("GetBookRequest");
        let bound = method(
            vec![BoundParam::Input {
                name: "input".into(),
                descriptor: request.clone(),
            }],
            ReturnType::message(fixtures::book()),
        );
        let args = bound.bind(&IndexMap::new(), None, None).unwrap();
        assert_eq!(args.message(0).unwrap(), &DynamicMessage::new(request));
    }

    #[test]
    fn test_bind_rejects_unknown_input_keys() {
        let request = fixtures::message_descriptor("GetBookRequest");
        let bound = method(
            vec![BoundParam::Input {
                name: "input".into(),
                descriptor: request,
            }],
            ReturnType::message(fixtures::book()),
        );
        let err = bound
            .bind(&arguments(json!({"input": {"id": "1", "extra": true}})), None, None)
            .err()
            .unwrap();
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_bind_source_requires_matching_parent() {
        let book = fixtures::book();
        let bound = method(vec![BoundParam::Source(book.clone())], ReturnType::scalar(Kind::Int32));

        let parent = DynamicMessage::new(book);
        let args = bound.bind(&IndexMap::new(), Some(&parent), None).unwrap();
        assert!(matches!(args.get(0).unwrap(), ParamValue::Source(_)));

        let date = DynamicMessage::new(fixtures::message_descriptor("Date"));
        assert!(bound.bind(&IndexMap::new(), Some(&date), None).is_err());
        assert!(bound.bind(&IndexMap::new(), None, None).is_err());
    }

    #[test]
    fn test_bind_context_and_provided() {
        let bound = method(
            vec![
                BoundParam::Context,
                BoundParam::Provided(Arc::new(|ctx: &RequestContext| {
                    Ok::<_, Error>(Arc::new(ctx.field_name.clone()) as Arc<dyn std::any::Any + Send + Sync>)
                })),
            ],
            ReturnType::scalar(Kind::String),
        );
        assert!(bound.needs_request());

        let request = RequestContext {
            field_name: "getBook".into(),
            ..Default::default()
        };
        let args = bound.bind(&IndexMap::new(), None, Some(&request)).unwrap();
        assert_eq!(args.context(0).unwrap().field_name, "getBook");
        assert_eq!(args.provided::<String>(1).unwrap().as_str(), "getBook");
    }

    #[test]
    fn test_node_arguments() {
        let bound = method(
            vec![
                BoundParam::Input {
                    name: "input".into(),
                    descriptor: fixtures::message_descriptor("GetBookRequest"),
                },
                BoundParam::Argument {
                    name: "id".into(),
                    kind: Kind::String,
                },
                BoundParam::Input {
                    name: "date".into(),
                    descriptor: fixtures::message_descriptor("Date"),
                },
            ],
            ReturnType::message(fixtures::book()),
        );
        let arguments = bound.node_arguments("42");
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments["input"], relay::raw_id_input("42"));
        assert_eq!(arguments["id"], Value::String("42".into()));
    }

    #[tokio::test]
    async fn test_finish_checks_declared_type() {
        let bound = method(vec![], ReturnType::message(fixtures::book()));
        let date = DynamicMessage::new(fixtures::message_descriptor("Date"));
        let err = bound.finish(Resolved::message(date)).await.unwrap_err();
        assert_eq!(err.code(), "RESOLVER_ERROR");

        let book = DynamicMessage::new(fixtures::book());
        let payload = bound
            .finish(Resolved::deferred(async move { Ok(Payload::Message(book)) }))
            .await
            .unwrap();
        assert!(matches!(payload, Payload::Message(_)));
    }

    #[test]
    fn test_map_entries_sorted_by_key() {
        let book = fixtures::book();
        let stock = book.get_field_by_name("stock").unwrap();
        let mut message = DynamicMessage::new(book);
        let mut map = std::collections::HashMap::new();
        map.insert(prost_reflect::MapKey::String("oslo".into()), prost_reflect::Value::I32(2));
        map.insert(prost_reflect::MapKey::String("lima".into()), prost_reflect::Value::I32(5));
        message.set_field(&stock, prost_reflect::Value::Map(map));

        let entries = map_entries(&message, &stock).unwrap();
        let keys: Vec<String> = entries
            .iter()
            .map(|entry| entry.get_field_by_name("key").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["lima", "oslo"]);
        assert_eq!(
            entries[0].get_field_by_name("value").unwrap().as_i32(),
            Some(5)
        );
    }

    #[test]
    fn test_unset_message_field_is_null() {
        let book = fixtures::book();
        let published = book.get_field_by_name("published").unwrap();
        let message = DynamicMessage::new(book);
        assert!(proto_field_value(&message, &published).unwrap().is_none());
    }

    #[test]
    fn test_debug_rendering() {
        let resolver = Resolver::Static(Value::from(1));
        assert_eq!(format!("{:?}", resolver), "Static(1)");
        let field = fixtures::book().get_field_by_name("title").unwrap();
        assert_eq!(
            format!("{:?}", Resolver::ProtoField(field)),
            "ProtoField(library.v1.Book.title)"
        );
    }
}
