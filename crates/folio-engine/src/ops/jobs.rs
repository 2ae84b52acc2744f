//! Job queue operations.

use std::time::Duration;

use folio_core::entities::BackgroundJob;
use folio_core::enums::JobStatus;
use folio_core::jobs::JobPayload;
use folio_db::error::DatabaseError;
use folio_db::helpers::now;
use folio_db::repos::{ClaimOutcome, JobOutcome};
use folio_db::TxOutcome;

use crate::error::EngineError;
use crate::service::FolioService;

impl FolioService {
    /// # Errors
    ///
    /// Returns a not-found error if the job does not exist.
    pub async fn get_job(&self, id: &str) -> Result<BackgroundJob, EngineError> {
        self.db()
            .repos()
            .jobs()
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("job", id))
    }

    /// Jobs in enqueue order, optionally filtered by status.
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<BackgroundJob>, EngineError> {
        Ok(self.db().repos().jobs().list(status).await?)
    }

    pub async fn enqueue_job(&self, payload: &JobPayload) -> Result<BackgroundJob, EngineError> {
        self.db()
            .run_in_serializable_transaction(|repos| async move {
                let job = repos.jobs().enqueue(payload, now()).await?;
                Ok::<_, EngineError>(TxOutcome::commit(job))
            })
            .await
    }

    /// Poll a job until it reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::WaitTimeout` if the job is still running after
    /// `timeout`, and a not-found error if it does not exist.
    pub async fn wait_for_job(
        &self,
        id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<BackgroundJob, EngineError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.get_job(id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(EngineError::WaitTimeout { job_id: id.to_string() });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Move one specific enqueued job into the processing slot.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the job does not exist.
    pub async fn claim_job(&self, id: &str) -> Result<ClaimOutcome, EngineError> {
        let outcome = self
            .db()
            .run_in_serializable_transaction(|repos| async move {
                let outcome = repos.jobs().claim(id, now()).await;
                match outcome {
                    Ok(outcome) => Ok(TxOutcome::commit(outcome)),
                    Err(DatabaseError::NoResult) => Err(EngineError::not_found("job", id)),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        log_claim(&outcome);
        Ok(outcome)
    }

    /// Move the oldest enqueued job into the processing slot.
    pub async fn claim_next_job(&self) -> Result<ClaimOutcome, EngineError> {
        let outcome = self
            .db()
            .run_in_serializable_transaction(|repos| async move {
                let outcome = repos.jobs().claim_next(now()).await?;
                Ok::<_, EngineError>(TxOutcome::commit(outcome))
            })
            .await?;
        log_claim(&outcome);
        Ok(outcome)
    }

    /// Record how a claimed job ended.
    ///
    /// `claimed` is the job as returned by the claim; the write only lands
    /// while that claim is still the current one.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Database` with `InvalidState` if `claimed` was
    /// never claimed, the job is no longer processing, or it has been claimed
    /// again since.
    pub async fn complete_job(
        &self,
        claimed: &BackgroundJob,
        outcome: &JobOutcome,
    ) -> Result<BackgroundJob, EngineError> {
        let claim_token = match claimed.claim_token.as_deref() {
            Some(token) if claimed.status.can_transition_to(outcome.status()) => token,
            _ => {
                return Err(DatabaseError::InvalidState(format!(
                    "job {} is {} without a claim, cannot complete",
                    claimed.id, claimed.status
                ))
                .into());
            }
        };
        let job = self
            .db()
            .run_in_serializable_transaction(|repos| async move {
                let job = repos.jobs().complete(&claimed.id, claim_token, outcome, now()).await?;
                Ok::<_, EngineError>(TxOutcome::commit(job))
            })
            .await?;
        match &job.error {
            Some(error) => tracing::info!(job_id = %job.id, kind = %job.kind, %error, "job failed"),
            None => tracing::info!(job_id = %job.id, kind = %job.kind, "job succeeded"),
        }
        Ok(job)
    }
}

fn log_claim(outcome: &ClaimOutcome) {
    match outcome {
        ClaimOutcome::Claimed(job) => tracing::info!(job_id = %job.id, kind = %job.kind, "job claimed"),
        ClaimOutcome::AlreadyClaimed { status } => tracing::debug!(%status, "job already claimed"),
        ClaimOutcome::SlotBusy => tracing::debug!("processing slot busy"),
        ClaimOutcome::Empty => {}
    }
}
