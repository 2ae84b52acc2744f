use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::JobStatus;
use crate::errors::CoreError;
use crate::jobs::{JobError, JobPayload, JobProgress};

/// A durably queued unit of asynchronous work.
///
/// `kind` and `input` are kept as stored so a job written by a newer build
/// stays readable; [`BackgroundJob::payload`] decodes them into the closed
/// `JobPayload` set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BackgroundJob {
    pub id: String,
    pub kind: String,
    pub input: serde_json::Value,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    /// Identifies the current claim. Set while `processing`; completion and
    /// progress writes must present it.
    #[serde(default)]
    pub claim_token: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set only when `status` is `failed`.
    pub error: Option<JobError>,
    /// Set only when `status` is `succeeded`.
    pub output: Option<serde_json::Value>,
    pub progress: Option<JobProgress>,
}

impl BackgroundJob {
    /// Decode the stored kind and input into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnsupportedPayload` if the kind is unknown or the
    /// input does not match it.
    pub fn payload(&self) -> Result<JobPayload, CoreError> {
        JobPayload::from_parts(&self.kind, &self.input)
    }
}
