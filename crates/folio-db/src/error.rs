//! Database error types for folio-db.

use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned data that could not be decoded.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// A write was refused because the row is not in the state it requires
    /// (e.g. completing a job that is not processing).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The write lock could not be taken within the busy timeout.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Whether the error is write-lock contention that a later attempt may
    /// not hit.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Busy(_) => true,
            Self::LibSql(e) => crate::retry::is_lock_contention(e),
            _ => false,
        }
    }
}
