//! Error types for schema composition and field resolution

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the composer
///
/// Configuration errors are raised by [`crate::SchemaBuilder::build`] and
/// abort schema assembly. Request-time errors are raised inside resolvers and
/// reach clients through the field's error entry.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent descriptor sets
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    /// A type reference with no backing descriptor or translated type
    #[error("Unresolved type '{type_name}' referenced by {referenced_by}")]
    UnresolvedType {
        type_name: String,
        referenced_by: String,
    },

    /// Two descriptors flatten to the same canonical name
    #[error("Duplicate type name '{name}' ({first} and {second})")]
    DuplicateTypeName {
        name: String,
        first: String,
        second: String,
    },

    /// AddField on a field that already exists
    #[error("Field '{field_name}' already exists on type '{type_name}'")]
    FieldConflict {
        type_name: String,
        field_name: String,
    },

    /// A method parameter shape that cannot be bound
    #[error("Unsupported parameter: {0}")]
    UnsupportedParameter(String),

    /// A method return shape that cannot be mapped to a GraphQL type
    #[error("Unsupported return type: {0}")]
    UnsupportedReturnType(String),

    /// GraphQL schema errors
    #[error("GraphQL schema error: {0}")]
    Schema(String),

    /// Invalid request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Enum name not declared by the target enum
    #[error("Unknown value '{value}' for enum '{enum_name}'")]
    UnknownEnumValue { enum_name: String, value: String },

    /// Global id decoding or node lookup failures
    #[error("Node lookup error: {0}")]
    NodeLookup(String),

    /// Errors raised by module handlers
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True for errors that abort schema assembly.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::Descriptor(_)
                | Error::UnresolvedType { .. }
                | Error::DuplicateTypeName { .. }
                | Error::FieldConflict { .. }
                | Error::UnsupportedParameter(_)
                | Error::UnsupportedReturnType(_)
                | Error::Schema(_)
                | Error::Io(_)
        )
    }

    /// Convert error to GraphQL error format
    ///
    /// # Security
    ///
    /// In production (ENV=production), internal error details are sanitized
    /// to prevent information disclosure. Only errors caused by the caller's
    /// input show their full message.
    pub fn to_graphql_error(&self) -> GraphQLError {
        let is_production = std::env::var("ENV")
            .map(|e| e == "production" || e == "prod")
            .unwrap_or(false);

        let message = if is_production {
            match self {
                Error::InvalidRequest(msg) => format!("Invalid request: {}", msg),
                Error::UnknownEnumValue { .. } | Error::NodeLookup(_) => self.to_string(),
                Error::Resolver(_) => "Resolver error".to_string(),
                Error::Serialization(_) => "Data processing error".to_string(),
                Error::Other(_) => "An unexpected error occurred".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        GraphQLError {
            message,
            extensions: self.extensions(),
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::Descriptor(_) => "DESCRIPTOR_ERROR",
            Error::UnresolvedType { .. } => "UNRESOLVED_TYPE",
            Error::DuplicateTypeName { .. } => "DUPLICATE_TYPE_NAME",
            Error::FieldConflict { .. } => "FIELD_CONFLICT",
            Error::UnsupportedParameter(_) => "UNSUPPORTED_PARAMETER",
            Error::UnsupportedReturnType(_) => "UNSUPPORTED_RETURN_TYPE",
            Error::Schema(_) => "SCHEMA_ERROR",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
            Error::UnknownEnumValue { .. } => "UNKNOWN_ENUM_VALUE",
            Error::NodeLookup(_) => "NODE_LOOKUP_ERROR",
            Error::Resolver(_) => "RESOLVER_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Other(_) => "UNKNOWN_ERROR",
        }
    }

    fn extensions(&self) -> std::collections::HashMap<String, serde_json::Value> {
        let mut map = std::collections::HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map
    }
}

impl ErrorExtensions for Error {
    fn extend(&self) -> async_graphql::Error {
        let graphql_error = self.to_graphql_error();
        let code = self.code();
        async_graphql::Error::new(graphql_error.message).extend_with(|_, e| e.set("code", code))
    }
}

/// GraphQL error response format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub extensions: std::collections::HashMap<String, serde_json::Value>,
}

impl From<Error> for GraphQLError {
    fn from(err: Error) -> Self {
        err.to_graphql_error()
    }
}
