//! Schema validation error types.

use thiserror::Error;

/// Errors from schema compilation and validation.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Requested schema name was not found in the registry.
    #[error("Schema not found: {0}")]
    NotFound(String),

    /// The schema itself is not a valid JSON Schema.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

}
