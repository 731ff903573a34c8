//! Relay global object identification
//!
//! Types with a relay id field implement the `Node` interface and expose
//! `id: ID!`, the base64 encoding of `TypeName:rawId`. The root
//! `node(id: ID!)` field decodes such an id and dispatches to the node
//! resolver registered for the embedded type name.

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::module::{Payload, Resolved};
use crate::naming;
use crate::resolver::BoundMethod;
use crate::types::{InterfaceType, TypeExpr};
use async_graphql::dynamic::{FieldValue, ResolverContext};
use async_graphql::indexmap::IndexMap;
use async_graphql::{Name, Value};
use base64::Engine as _;
use prost_reflect::ReflectMessage;
use std::sync::Arc;
use tracing::debug;

pub const NODE_INTERFACE: &str = "Node";

/// Root query field resolving any node by global id.
pub const NODE_FIELD: &str = "node";

pub fn encode_global_id(type_name: &str, raw_id: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", type_name, raw_id))
}

/// Split a global id into `(type name, raw id)`.
pub fn decode_global_id(global_id: &str) -> Result<(String, String)> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(global_id)
        .map_err(|_| Error::NodeLookup(format!("malformed global id '{}'", global_id)))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|_| Error::NodeLookup(format!("malformed global id '{}'", global_id)))?;
    let (type_name, raw_id) = decoded
        .split_once(':')
        .ok_or_else(|| Error::NodeLookup(format!("global id '{}' has no type", global_id)))?;
    Ok((type_name.to_string(), raw_id.to_string()))
}

/// The `Node` interface definition.
pub fn node_interface() -> InterfaceType {
    InterfaceType {
        name: NODE_INTERFACE.to_string(),
        description: Some("An object with a globally unique identifier".to_string()),
        fields: vec![("id".to_string(), TypeExpr::named_nn("ID"))],
    }
}

type LookupFn = Arc<dyn Fn(String, &RequestContext) -> Result<Resolved> + Send + Sync>;

#[derive(Clone)]
enum Lookup {
    Method(Arc<BoundMethod>),
    Custom(LookupFn),
}

/// Raw id -> message lookup for one node type
#[derive(Clone)]
pub struct NodeResolver {
    type_name: String,
    lookup: Lookup,
}

impl NodeResolver {
    /// Lookup closure for the object type `type_name`, called with the raw id.
    pub fn new<F>(type_name: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(String, &RequestContext) -> Result<Resolved> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            lookup: Lookup::Custom(Arc::new(lookup)),
        }
    }

    pub(crate) fn from_method(type_name: impl Into<String>, method: Arc<BoundMethod>) -> Self {
        Self {
            type_name: type_name.into(),
            lookup: Lookup::Method(method),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    // The raw id reaches a method as `{"id": raw}` for message inputs and
    // as the value of an argument called `id`
    fn start(&self, raw_id: &str, ctx: &ResolverContext<'_>) -> Result<Resolved> {
        match &self.lookup {
            Lookup::Custom(lookup) => lookup(raw_id.to_string(), &RequestContext::from_resolver(ctx)),
            Lookup::Method(method) => {
                let arguments = method.node_arguments(raw_id);
                method.start_with(ctx, &arguments, None)
            }
        }
    }

    async fn finish(&self, resolved: Resolved) -> Result<Payload> {
        match &self.lookup {
            Lookup::Custom(_) => resolved.into_payload().await,
            Lookup::Method(method) => method.finish(resolved).await,
        }
    }
}

impl std::fmt::Debug for NodeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.lookup {
            Lookup::Method(_) => "method",
            Lookup::Custom(_) => "custom",
        };
        f.debug_struct("NodeResolver")
            .field("type_name", &self.type_name)
            .field("lookup", &kind)
            .finish()
    }
}

/// Node resolvers of one schema, by object type name
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    resolvers: IndexMap<String, NodeResolver>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver; a later one for the same type replaces the earlier.
    pub fn insert(&mut self, resolver: NodeResolver) {
        self.resolvers.insert(resolver.type_name.clone(), resolver);
    }

    pub fn get(&self, type_name: &str) -> Option<&NodeResolver> {
        self.resolvers.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.resolvers.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub(crate) fn extend(&mut self, other: NodeRegistry) {
        for resolver in other.resolvers.into_values() {
            self.insert(resolver);
        }
    }

    /// Resolve the root `node` field.
    pub(crate) async fn resolve<'a>(&self, ctx: ResolverContext<'a>) -> Result<Option<FieldValue<'a>>> {
        let global_id = ctx
            .args
            .get("id")
            .and_then(|id| id.string().ok().map(str::to_string))
            .ok_or_else(|| Error::InvalidRequest("node requires an 'id' argument".to_string()))?;
        let (type_name, raw_id) = decode_global_id(&global_id)?;
        let resolver = self
            .get(&type_name)
            .cloned()
            .ok_or_else(|| Error::NodeLookup(format!("no node resolver for type '{}'", type_name)))?;

        debug!(type_name = %type_name, raw_id = %raw_id, "Resolving node");
        let resolved = resolver.start(&raw_id, &ctx)?;
        match resolver.finish(resolved).await? {
            Payload::Null => Ok(None),
            Payload::Message(message) => {
                let actual = naming::reference_name(&message.descriptor());
                if actual != type_name {
                    return Err(Error::NodeLookup(format!(
                        "node resolver for '{}' returned '{}'",
                        type_name, actual
                    )));
                }
                Ok(Some(FieldValue::owned_any(message).with_type(type_name)))
            }
            _ => Err(Error::NodeLookup(format!(
                "node resolver for '{}' did not return a message",
                type_name
            ))),
        }
    }
}

/// Input object `{id: raw}` handed to node methods.
pub(crate) fn raw_id_input(raw_id: &str) -> Value {
    let mut object = IndexMap::new();
    object.insert(Name::new("id"), Value::String(raw_id.to_string()));
    Value::Object(object)
}
