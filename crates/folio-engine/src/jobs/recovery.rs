//! Recovery of jobs left in `processing` by a worker that went away.
//!
//! Nothing here runs unless the configured [`StuckJobPolicy`] asks for it.
//! With `manual`, a stuck job holds the processing slot until an operator
//! deals with it.

use chrono::TimeDelta;
use folio_config::StuckJobPolicy;
use folio_core::jobs::JobError;
use folio_db::error::DatabaseError;
use folio_db::helpers::now;
use folio_db::TxOutcome;
use folio_db::repos::JobOutcome;

use crate::error::EngineError;
use crate::service::FolioService;

/// Jobs touched by one recovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub requeued: Vec<String>,
    pub failed: Vec<String>,
}

impl RecoveryReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requeued.is_empty() && self.failed.is_empty()
    }
}

impl FolioService {
    /// Apply the stuck-job policy to processing jobs older than
    /// `jobs.stuck_after_secs`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Database` if the stale jobs cannot be read or
    /// updated.
    pub async fn recover_stuck_jobs(&self) -> Result<RecoveryReport, EngineError> {
        let jobs_config = &self.config().jobs;
        let mut report = RecoveryReport::default();
        if jobs_config.stuck_job_policy == StuckJobPolicy::Manual {
            return Ok(report);
        }
        let Some(cutoff) = TimeDelta::from_std(jobs_config.stuck_after())
            .ok()
            .and_then(|age| now().checked_sub_signed(age))
        else {
            return Ok(report);
        };

        let policy = jobs_config.stuck_job_policy;
        let stuck_after_secs = jobs_config.stuck_after_secs;
        self.db()
            .run_in_serializable_transaction(|repos| async move {
                for job in repos.jobs().stale_processing(cutoff).await? {
                    let Some(claim_token) = job.claim_token.as_deref() else {
                        continue;
                    };
                    match policy {
                        StuckJobPolicy::Manual => {}
                        StuckJobPolicy::Requeue => {
                            if repos.jobs().requeue(&job.id, claim_token).await? {
                                tracing::warn!(job_id = %job.id, kind = %job.kind, "stuck job requeued");
                                report.requeued.push(job.id);
                            }
                        }
                        StuckJobPolicy::Fail => {
                            let outcome = JobOutcome::Failed {
                                error: JobError::Abandoned {
                                    message: format!(
                                        "processing for more than {stuck_after_secs}s without completing"
                                    ),
                                },
                            };
                            match repos.jobs().complete(&job.id, claim_token, &outcome, now()).await {
                                Ok(_) => {
                                    tracing::warn!(job_id = %job.id, kind = %job.kind, "stuck job failed");
                                    report.failed.push(job.id);
                                }
                                // Completed by its worker in the meantime.
                                Err(DatabaseError::InvalidState(_)) => {}
                                Err(e) => return Err(EngineError::from(e)),
                            }
                        }
                    }
                }
                Ok(TxOutcome::commit(report))
            })
            .await
    }
}
