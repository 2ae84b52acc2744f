//! Background job payloads, errors, and progress snapshots.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::enums::JobKind;
use crate::errors::CoreError;
use crate::migration::MigrationFailure;

/// Input for a `migrate_collection` job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MigrateCollectionInput {
    /// The new version; documents at its predecessor are migrated into it.
    pub collection_version_id: String,
}

/// Input for a `delete_collection` job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DeleteCollectionInput {
    pub collection_id: String,
}

/// The closed set of job payloads, one variant per `JobKind`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "kind", content = "input", rename_all = "snake_case")]
pub enum JobPayload {
    MigrateCollection(MigrateCollectionInput),
    DeleteCollection(DeleteCollectionInput),
}

impl JobPayload {
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self {
            Self::MigrateCollection(_) => JobKind::MigrateCollection,
            Self::DeleteCollection(_) => JobKind::DeleteCollection,
        }
    }

    /// The input half of the payload, as stored in the `input` column.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Other` if serialization fails.
    pub fn input(&self) -> Result<serde_json::Value, CoreError> {
        let value = match self {
            Self::MigrateCollection(input) => serde_json::to_value(input),
            Self::DeleteCollection(input) => serde_json::to_value(input),
        };
        value.map_err(|e| CoreError::Other(e.into()))
    }

    /// Rebuild a payload from a stored kind and input.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnsupportedPayload` if `kind` is unknown or `input`
    /// does not match the kind's input shape.
    pub fn from_parts(kind: &str, input: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(serde_json::json!({ "kind": kind, "input": input })).map_err(|e| {
            CoreError::UnsupportedPayload {
                kind: kind.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

/// Structured reason a job ended `failed`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobError {
    /// A migration attempted every eligible document and some failed.
    MigrationFailed { failure: MigrationFailure },
    /// The job's preconditions did not hold; nothing was changed.
    Rejected { message: String },
    /// A stale `processing` job was failed by the recovery policy.
    Abandoned { message: String },
    /// Storage fault, handler panic, or undecodable payload.
    Internal { message: String },
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MigrationFailed { failure } => write!(
                f,
                "migration of collection {} failed for {} document(s)",
                failure.collection_id,
                failure.failures.len()
            ),
            Self::Rejected { message } => write!(f, "rejected: {message}"),
            Self::Abandoned { message } => write!(f, "abandoned: {message}"),
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

/// Last reported progress of a running job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct JobProgress {
    pub total: u64,
    pub processed: u64,
    pub migrated: u64,
    pub skipped: u64,
    pub failed: u64,
}
