//! Status enums, job kinds, and failure kinds for Folio.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! Status enums with state machines provide `allowed_next_states()` to enforce
//! valid transitions at the application layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Status of a background job.
///
/// ```text
/// enqueued → processing → succeeded
///                       → failed
/// ```
///
/// `succeeded` and `failed` are terminal. At most one job system-wide may be
/// `processing` at any instant; the storage layer enforces this on claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Enqueued => &[Self::Processing],
            Self::Processing => &[Self::Succeeded, Self::Failed],
            Self::Succeeded | Self::Failed => &[],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enqueued => "enqueued",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// The closed set of background job kinds.
///
/// Adding a kind means adding a `JobPayload` variant and a handler arm; the
/// exhaustive matches in the job engine make a missing handler a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    MigrateCollection,
    DeleteCollection,
}

impl JobKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MigrateCollection => "migrate_collection",
            Self::DeleteCollection => "delete_collection",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

/// The three artifacts derived from document content by user getters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Summary,
    Fingerprint,
    BlockingKeys,
}

impl ArtifactKind {
    pub const ALL: [Self; 3] = [Self::Summary, Self::Fingerprint, Self::BlockingKeys];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Fingerprint => "fingerprint",
            Self::BlockingKeys => "blocking_keys",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ExecutionFailureKind
// ---------------------------------------------------------------------------

/// Why a sandboxed function call did not produce a usable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionFailureKind {
    /// The module could not be compiled or has no callable default export.
    Compile,
    /// The function threw (or panicked) while running.
    Runtime,
    /// The returned value does not survive a serialize/deserialize round-trip.
    NonInvariantResult,
    /// The call exceeded its execution budget.
    Timeout,
    /// The sandbox itself failed (spawn error, protocol violation, ...).
    Internal,
}

impl ExecutionFailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Runtime => "runtime",
            Self::NonInvariantResult => "non_invariant_result",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ExecutionFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
