//! Cross-cutting error types for Folio.
//!
//! Domain-specific errors (`DatabaseError`, `SchemaError`, `EngineError`) live
//! in their respective crates. This module holds the errors raised while
//! interpreting core types themselves.

use thiserror::Error;

/// Errors that can be raised by any Folio crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        from: String,
        to: String,
    },

    /// A stored job payload does not match any known job kind.
    #[error("Unsupported job payload for kind '{kind}': {reason}")]
    UnsupportedPayload { kind: String, reason: String },

    /// Data failed validation (schema, format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
