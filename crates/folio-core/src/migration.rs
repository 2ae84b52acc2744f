//! Collection migration results.
//!
//! A migration attempts every eligible document and never rolls back the ones
//! that succeeded. The outcome is either a `MigrationReport` (no failures) or
//! a `MigrationFailure` listing every document that could not be migrated.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::derived::ValidationIssue;
use crate::script::ExecutionFailed;

/// A document that now has a version at the target collection version.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MigratedDocument {
    pub document_id: String,
    pub version_id: String,
}

/// Outcome of a migration in which every eligible document was migrated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MigrationReport {
    pub collection_id: String,
    pub from_version_id: String,
    pub to_version_id: String,
    pub migrated: Vec<MigratedDocument>,
    /// Documents that left the source version before their turn came.
    pub skipped: Vec<String>,
}

/// Why a single document could not be migrated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MigrationFailureCause {
    /// The migration function did not return a usable value.
    ApplyingMigrationFailed { failure: ExecutionFailed },
    /// The migrated content does not satisfy the target schema.
    ContentNotValid { issues: Vec<ValidationIssue> },
    /// The document's transaction could not be committed.
    PersistFailed { message: String },
}

impl fmt::Display for MigrationFailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApplyingMigrationFailed { failure } => {
                write!(f, "applying migration failed: {failure}")
            }
            Self::ContentNotValid { issues } => {
                write!(f, "migrated content not valid ({} issue(s))", issues.len())
            }
            Self::PersistFailed { message } => write!(f, "persisting failed: {message}"),
        }
    }
}

/// One failed document and its cause.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DocumentMigrationFailure {
    pub document_id: String,
    pub cause: MigrationFailureCause,
}

/// Aggregate failure reported once every eligible document was attempted.
///
/// Documents counted in `migrated` stay migrated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MigrationFailure {
    pub collection_id: String,
    pub from_version_id: String,
    pub to_version_id: String,
    pub migrated: u64,
    pub skipped: u64,
    pub failures: Vec<DocumentMigrationFailure>,
}

impl fmt::Display for MigrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "migration {} -> {} of collection {}: {} migrated, {} failed",
            self.from_version_id,
            self.to_version_id,
            self.collection_id,
            self.migrated,
            self.failures.len()
        )
    }
}
