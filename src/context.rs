//! Per-request context handed to module methods
//!
//! Methods that declare [`crate::Param::Context`] receive a [`RequestContext`]
//! snapshot of the field being resolved. Hosts attach their own per-request
//! values (auth claims, request ids) by adding [`RequestData`] to the
//! async-graphql request:
//!
//! ```rust
//! use grpc_graphql_compose::RequestData;
//!
//! let data = RequestData::new()
//!     .with("request_id", serde_json::json!("req-42"))
//!     .with("user", serde_json::json!({"id": "u1"}));
//! let request = async_graphql::Request::new("{ __typename }").data(data);
//! # let _ = request;
//! ```

use crate::error::Result;
use crate::field_mask::{FieldMaskBuilder, Fragments, Selection};
use async_graphql::dynamic::ResolverContext;
use async_graphql::indexmap::IndexMap;
use async_graphql::{Name, Value};
use prost_reflect::MessageDescriptor;
use prost_types::FieldMask;
use std::collections::HashMap;

/// Host-supplied values attached to a request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestData {
    values: HashMap<String, serde_json::Value>,
}

impl RequestData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }
}

/// Owned copy of a resolver's arguments.
pub(crate) fn argument_map(ctx: &ResolverContext<'_>) -> IndexMap<Name, Value> {
    ctx.args
        .iter()
        .map(|(name, value)| (name.clone(), value.as_value().clone()))
        .collect()
}

/// Snapshot of the field being resolved
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Name of the field in the schema
    pub field_name: String,

    /// Response path, e.g. `library.getBook`
    pub path: Option<String>,

    /// Arguments after variable substitution
    pub arguments: IndexMap<Name, Value>,

    /// Sub-selection of the field, fragments flattened
    pub selection: Vec<Selection>,

    /// Values attached by the host
    pub data: RequestData,
}

impl RequestContext {
    pub(crate) fn from_resolver(ctx: &ResolverContext<'_>) -> Self {
        let field = ctx.ctx.field();
        Self {
            field_name: field.name().to_string(),
            path: ctx.ctx.path_node.map(|node| node.to_string_vec().join(".")),
            arguments: argument_map(ctx),
            selection: field.selection_set().map(Selection::from_selection_field).collect(),
            data: ctx.ctx.data_opt::<RequestData>().cloned().unwrap_or_default(),
        }
    }

    /// Value attached by the host under `key`.
    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Field mask of the current selection against the field's response type.
    pub fn field_mask(&self, descriptor: &MessageDescriptor) -> Result<FieldMask> {
        let fragments = Fragments::new();
        FieldMaskBuilder::new(&fragments).build(&self.selection, descriptor)
    }
}
