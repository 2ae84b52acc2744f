//! Engine error types.

use folio_core::derived::ValidationIssue;
use folio_core::errors::CoreError;
use folio_core::migration::MigrationFailure;
use folio_db::error::DatabaseError;
use folio_schema::SchemaError;
use thiserror::Error;

/// Errors from service operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request was refused before anything was written.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Document content does not satisfy the collection version's schema.
    #[error("Content not valid: {} issue(s)", issues.len())]
    ContentNotValid { issues: Vec<ValidationIssue> },

    /// State moved underneath the operation; retrying may succeed.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A job did not reach a terminal state in time.
    #[error("Timed out waiting for job {job_id}")]
    WaitTimeout { job_id: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl EngineError {
    pub(crate) fn not_found(entity_type: &str, id: &str) -> Self {
        Self::Core(CoreError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        })
    }

    /// Whether the error reports a missing entity.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Core(CoreError::NotFound { .. }))
    }
}

/// Errors from running a collection migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The migration cannot start; no document was touched.
    #[error("Migration rejected: {0}")]
    Rejected(String),

    /// Every eligible document was attempted and at least one failed.
    #[error("{0}")]
    Failed(MigrationFailure),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<DatabaseError> for MigrationError {
    fn from(e: DatabaseError) -> Self {
        Self::Engine(e.into())
    }
}
