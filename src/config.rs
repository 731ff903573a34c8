//! Schema assembly options
//!
//! [`SchemaOptions`] controls how descriptors are translated and how the
//! finished schema is handed to the executor. It can be built fluently or
//! deserialized from a configuration file; the comment map is runtime-only.
//!
//! ```rust
//! use grpc_graphql_compose::SchemaOptions;
//!
//! let options = SchemaOptions::default()
//!     .with_proto_scalar_types(true)
//!     .with_max_depth(12);
//! assert_eq!(options.query_type_name, "Query");
//! ```

use crate::comments::CommentMap;
use serde::Deserialize;

/// Default option extension marking a field as the relay node id.
pub const DEFAULT_RELAY_ID_EXTENSION: &str = "graphql.relay_id";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    /// Use protobuf-specific scalars (`Int64`, `UInt32`, `Bytes`...) instead of
    /// the portable `Int`/`Long`/`String` mapping
    pub use_proto_scalar_types: bool,

    /// Full name of the `bool` field-option extension flagging relay ids
    pub relay_id_extension: String,

    pub query_type_name: String,

    pub mutation_type_name: String,

    /// Maximum query depth accepted by the executor
    pub max_depth: Option<usize>,

    /// Maximum query complexity accepted by the executor
    pub max_complexity: Option<usize>,

    /// Expose `__schema` / `__type`
    pub introspection: bool,

    /// Drop types that cannot be reached from the root operations
    pub prune_unreachable_types: bool,

    /// Descriptions keyed by full descriptor name
    #[serde(skip)]
    pub comments: CommentMap,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            use_proto_scalar_types: false,
            relay_id_extension: DEFAULT_RELAY_ID_EXTENSION.to_string(),
            query_type_name: "Query".to_string(),
            mutation_type_name: "Mutation".to_string(),
            max_depth: None,
            max_complexity: None,
            introspection: true,
            prune_unreachable_types: false,
            comments: CommentMap::default(),
        }
    }
}

impl SchemaOptions {
    pub fn with_proto_scalar_types(mut self, enabled: bool) -> Self {
        self.use_proto_scalar_types = enabled;
        self
    }

    pub fn with_relay_id_extension(mut self, name: impl Into<String>) -> Self {
        self.relay_id_extension = name.into();
        self
    }

    pub fn with_root_type_names(
        mut self,
        query: impl Into<String>,
        mutation: impl Into<String>,
    ) -> Self {
        self.query_type_name = query.into();
        self.mutation_type_name = mutation.into();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_complexity(mut self, complexity: usize) -> Self {
        self.max_complexity = Some(complexity);
        self
    }

    pub fn with_introspection(mut self, enabled: bool) -> Self {
        self.introspection = enabled;
        self
    }

    pub fn with_pruning(mut self, enabled: bool) -> Self {
        self.prune_unreachable_types = enabled;
        self
    }

    pub fn with_comments(mut self, comments: CommentMap) -> Self {
        self.comments = comments;
        self
    }

    /// Parse options from JSON, missing keys keep their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
