//! Background job repository: the durable queue and its processing slot.
//!
//! Status only moves forward: `enqueued → processing → {succeeded, failed}`.
//! Every transition is a single conditional `UPDATE` on the current status,
//! so a lost race changes zero rows instead of overwriting another worker's
//! claim. The partial unique index on `status = 'processing'` keeps the slot
//! single even if a caller skips the conditions.
//!
//! Each claim draws a fresh `claim_token`. Writes made on behalf of a claim
//! (completion, progress, requeue) match on it, so a worker whose job was
//! recovered and claimed again cannot touch the newer claim.
//!
//! [`JobRepo::requeue`] is the one backward move, reserved for recovering
//! jobs abandoned by a crashed worker.

use chrono::{DateTime, Utc};
use folio_core::entities::BackgroundJob;
use folio_core::enums::JobStatus;
use folio_core::ids::PREFIX_JOB;
use folio_core::jobs::{JobError, JobPayload, JobProgress};

use crate::error::DatabaseError;
use crate::helpers::{
    format_datetime, get_opt_string, parse_datetime, parse_enum, parse_json, parse_optional_datetime,
    parse_optional_json, to_json_text,
};

const SELECT_COLS: &str =
    "id, kind, input, status, enqueued_at, started_at, finished_at, error, output, progress, claim_token";

const NEW_CLAIM_TOKEN: &str = "lower(hex(randomblob(16)))";

fn row_to_job(row: &libsql::Row) -> Result<BackgroundJob, DatabaseError> {
    Ok(BackgroundJob {
        id: row.get(0)?,
        kind: row.get(1)?,
        input: parse_json(&row.get::<String>(2)?)?,
        status: parse_enum(&row.get::<String>(3)?)?,
        enqueued_at: parse_datetime(&row.get::<String>(4)?)?,
        started_at: parse_optional_datetime(get_opt_string(row, 5)?.as_deref())?,
        finished_at: parse_optional_datetime(get_opt_string(row, 6)?.as_deref())?,
        error: parse_optional_json(get_opt_string(row, 7)?.as_deref())?,
        output: parse_optional_json(get_opt_string(row, 8)?.as_deref())?,
        progress: parse_optional_json(get_opt_string(row, 9)?.as_deref())?,
        claim_token: get_opt_string(row, 10)?,
    })
}

/// Result of trying to move a job into the processing slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The job is now `processing` and belongs to the caller.
    Claimed(BackgroundJob),
    /// The job had already left `enqueued`.
    AlreadyClaimed { status: JobStatus },
    /// Another job holds the processing slot.
    SlotBusy,
    /// Nothing is enqueued.
    Empty,
}

impl ClaimOutcome {
    #[must_use]
    pub fn into_claimed(self) -> Option<BackgroundJob> {
        match self {
            Self::Claimed(job) => Some(job),
            _ => None,
        }
    }
}

/// How a processing job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded { output: Option<serde_json::Value> },
    Failed { error: JobError },
}

impl JobOutcome {
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        match self {
            Self::Succeeded { .. } => JobStatus::Succeeded,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

pub struct JobRepo<'a> {
    conn: &'a libsql::Connection,
}

impl<'a> JobRepo<'a> {
    pub(crate) const fn new(conn: &'a libsql::Connection) -> Self {
        Self { conn }
    }

    /// Append a job to the queue.
    pub async fn enqueue(
        &self,
        payload: &JobPayload,
        enqueued_at: DateTime<Utc>,
    ) -> Result<BackgroundJob, DatabaseError> {
        let id = super::generate_id(self.conn, PREFIX_JOB).await?;
        let job = BackgroundJob {
            id,
            kind: payload.kind().as_str().to_string(),
            input: payload.input().map_err(|e| DatabaseError::Other(e.into()))?,
            status: JobStatus::Enqueued,
            enqueued_at,
            started_at: None,
            claim_token: None,
            finished_at: None,
            error: None,
            output: None,
            progress: None,
        };
        self.insert(&job).await?;
        tracing::debug!(job_id = %job.id, kind = %job.kind, "job enqueued");
        Ok(job)
    }

    /// Insert a job row as given.
    pub async fn insert(&self, job: &BackgroundJob) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO background_jobs ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                libsql::params![
                    job.id.as_str(),
                    job.kind.as_str(),
                    to_json_text(&job.input)?,
                    job.status.as_str(),
                    format_datetime(&job.enqueued_at),
                    job.started_at.as_ref().map(format_datetime),
                    job.finished_at.as_ref().map(format_datetime),
                    job.error.as_ref().map(to_json_text).transpose()?,
                    job.output.as_ref().map(to_json_text).transpose()?,
                    job.progress.as_ref().map(to_json_text).transpose()?,
                    job.claim_token.as_deref()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn find(&self, id: &str) -> Result<Option<BackgroundJob>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM background_jobs WHERE id = ?1"),
                [id],
            )
            .await?;
        rows.next().await?.map(|row| row_to_job(&row)).transpose()
    }

    /// Jobs in queue order, optionally restricted to one status.
    pub async fn list(&self, status: Option<JobStatus>) -> Result<Vec<BackgroundJob>, DatabaseError> {
        let mut rows = match status {
            Some(status) => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {SELECT_COLS} FROM background_jobs
                             WHERE status = ?1 ORDER BY enqueued_at, rowid"
                        ),
                        [status.as_str()],
                    )
                    .await?
            }
            None => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {SELECT_COLS} FROM background_jobs ORDER BY enqueued_at, rowid"
                        ),
                        (),
                    )
                    .await?
            }
        };
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(row_to_job(&row)?);
        }
        Ok(jobs)
    }

    /// The job currently holding the processing slot, if any.
    pub async fn processing(&self) -> Result<Option<BackgroundJob>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM background_jobs WHERE status = 'processing'"),
                (),
            )
            .await?;
        rows.next().await?.map(|row| row_to_job(&row)).transpose()
    }

    /// Claim the oldest enqueued job (FIFO by enqueue time, then insertion).
    ///
    /// Must run inside a serializable transaction for the slot check and the
    /// status swap to be one step.
    pub async fn claim_next(&self, started_at: DateTime<Utc>) -> Result<ClaimOutcome, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "UPDATE background_jobs
                     SET status = 'processing', started_at = ?1, claim_token = {NEW_CLAIM_TOKEN}
                     WHERE id = (
                         SELECT id FROM background_jobs WHERE status = 'enqueued'
                         ORDER BY enqueued_at, rowid LIMIT 1
                     )
                       AND status = 'enqueued'
                       AND NOT EXISTS (SELECT 1 FROM background_jobs WHERE status = 'processing')
                     RETURNING {SELECT_COLS}"
                ),
                [format_datetime(&started_at)],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            return Ok(ClaimOutcome::Claimed(row_to_job(&row)?));
        }
        drop(rows);

        if self.processing().await?.is_some() {
            return Ok(ClaimOutcome::SlotBusy);
        }
        Ok(ClaimOutcome::Empty)
    }

    /// Claim one specific job.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if the job does not exist.
    pub async fn claim(&self, job_id: &str, started_at: DateTime<Utc>) -> Result<ClaimOutcome, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "UPDATE background_jobs
                     SET status = 'processing', started_at = ?2, claim_token = {NEW_CLAIM_TOKEN}
                     WHERE id = ?1
                       AND status = 'enqueued'
                       AND NOT EXISTS (SELECT 1 FROM background_jobs WHERE status = 'processing')
                     RETURNING {SELECT_COLS}"
                ),
                libsql::params![job_id, format_datetime(&started_at)],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            return Ok(ClaimOutcome::Claimed(row_to_job(&row)?));
        }
        drop(rows);

        let job = self.find(job_id).await?.ok_or(DatabaseError::NoResult)?;
        if job.status == JobStatus::Enqueued {
            Ok(ClaimOutcome::SlotBusy)
        } else {
            Ok(ClaimOutcome::AlreadyClaimed { status: job.status })
        }
    }

    /// Move a processing job into its terminal state.
    ///
    /// Status, finish time, and error or output are written by one statement,
    /// and only while `claim_token` still names the current claim.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the job is not processing or
    /// has been claimed again since `claim_token` was issued.
    pub async fn complete(
        &self,
        job_id: &str,
        claim_token: &str,
        outcome: &JobOutcome,
        finished_at: DateTime<Utc>,
    ) -> Result<BackgroundJob, DatabaseError> {
        let (error, output) = match outcome {
            JobOutcome::Succeeded { output } => (None, output.as_ref().map(to_json_text).transpose()?),
            JobOutcome::Failed { error } => (Some(to_json_text(error)?), None),
        };
        let mut rows = self
            .conn
            .query(
                &format!(
                    "UPDATE background_jobs
                     SET status = ?2, finished_at = ?3, error = ?4, output = ?5, claim_token = NULL
                     WHERE id = ?1 AND status = 'processing' AND claim_token = ?6
                     RETURNING {SELECT_COLS}"
                ),
                libsql::params![
                    job_id,
                    outcome.status().as_str(),
                    format_datetime(&finished_at),
                    error,
                    output,
                    claim_token
                ],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            return row_to_job(&row);
        }
        drop(rows);

        let message = match self.find(job_id).await? {
            None => format!("job {job_id} does not exist"),
            Some(job) if job.status.can_transition_to(outcome.status()) => {
                format!("job {job_id} was claimed again, this claim is stale")
            }
            Some(job) => format!("job {job_id} is {}, not processing", job.status),
        };
        Err(DatabaseError::InvalidState(message))
    }

    /// Store a progress snapshot for the current claim.
    ///
    /// Returns whether the snapshot was stored; it is not once the job has
    /// left `processing` or been claimed again.
    pub async fn record_progress(
        &self,
        job_id: &str,
        claim_token: &str,
        progress: &JobProgress,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute(
                "UPDATE background_jobs SET progress = ?3
                 WHERE id = ?1 AND status = 'processing' AND claim_token = ?2",
                libsql::params![job_id, claim_token, to_json_text(progress)?],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Processing jobs started before `cutoff`.
    pub async fn stale_processing(&self, cutoff: DateTime<Utc>) -> Result<Vec<BackgroundJob>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM background_jobs
                     WHERE status = 'processing' AND started_at < ?1
                     ORDER BY started_at, rowid"
                ),
                [format_datetime(&cutoff)],
            )
            .await?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(row_to_job(&row)?);
        }
        Ok(jobs)
    }

    /// Put a processing job back in the queue, keeping its enqueue time.
    ///
    /// Returns whether the job was still held by `claim_token`.
    pub async fn requeue(&self, job_id: &str, claim_token: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute(
                "UPDATE background_jobs
                 SET status = 'enqueued', started_at = NULL, progress = NULL, claim_token = NULL
                 WHERE id = ?1 AND status = 'processing' AND claim_token = ?2",
                [job_id, claim_token],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute("DELETE FROM background_jobs WHERE id = ?1", [id])
            .await?;
        Ok(affected > 0)
    }
}
