//! The job worker.
//!
//! One worker drains the queue one job at a time. Each handler runs in its
//! own task so a panic becomes a failed job instead of taking the worker
//! down.

use std::time::Duration;

use folio_core::entities::BackgroundJob;
use folio_core::jobs::JobError;
use folio_db::repos::JobOutcome;
use tokio::sync::watch;

use crate::error::EngineError;
use crate::jobs::handlers;
use crate::service::FolioService;

pub struct Worker {
    service: FolioService,
    poll_interval: Duration,
}

impl Worker {
    /// A worker polling at the configured `jobs.poll_interval_ms`.
    #[must_use]
    pub fn new(service: FolioService) -> Self {
        let poll_interval = service.config().jobs.poll_interval();
        Self { service, poll_interval }
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Recover stuck jobs, then claim, run, and complete the oldest enqueued
    /// job.
    ///
    /// Returns the completed job, or `None` if nothing could be claimed.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the queue cannot be read or the outcome
    /// cannot be recorded.
    pub async fn run_once(&self) -> Result<Option<BackgroundJob>, EngineError> {
        self.service.recover_stuck_jobs().await?;

        let Some(job) = self.service.claim_next_job().await?.into_claimed() else {
            return Ok(None);
        };
        let outcome = self.execute(&job).await;
        let done = self.service.complete_job(&job, &outcome).await?;
        Ok(Some(done))
    }

    /// Process jobs until `shutdown` turns `true` or its sender is dropped.
    ///
    /// A job in progress is finished before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(poll_interval_ms = self.poll_interval.as_millis(), "worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_once().await {
                // Go straight for the next job while the queue is non-empty.
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "worker iteration failed"),
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        tracing::info!("worker stopped");
    }

    async fn execute(&self, job: &BackgroundJob) -> JobOutcome {
        let service = self.service.clone();
        let claimed = job.clone();
        let task = tokio::spawn(async move { handlers::dispatch(&service, &claimed).await });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = %job.id, kind = %job.kind, error = %e, "job handler panicked");
                JobOutcome::Failed {
                    error: JobError::Internal {
                        message: format!("handler panicked: {e}"),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{people_v1, people_v2, test_service};
    use folio_core::enums::JobStatus;
    use folio_core::migration::MigrationReport;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn run_once_on_empty_queue() {
        let svc = test_service().await;
        assert!(Worker::new(svc).run_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn run_once_completes_migration_job() {
        let svc = test_service().await;
        let (collection, _) = svc.create_collection("people", people_v1()).await.unwrap();
        svc.create_document(&collection.id, json!({"name": "Ada"})).await.unwrap();
        let (v2, job) = svc
            .create_collection_version(&collection.id, people_v2("add-age"))
            .await
            .unwrap();

        let worker = Worker::new(svc.clone());
        let done = worker.run_once().await.unwrap().unwrap();
        assert_eq!(done.id, job.id);
        assert_eq!(done.status, JobStatus::Succeeded);
        let report: MigrationReport = serde_json::from_value(done.output.unwrap()).unwrap();
        assert_eq!(report.to_version_id, v2.id);
        assert_eq!(report.migrated.len(), 1);

        assert!(worker.run_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let svc = test_service().await;
        let (collection, _) = svc.create_collection("people", people_v1()).await.unwrap();
        let job = svc.delete_collection(&collection.id).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let worker = Worker::new(svc.clone()).with_poll_interval(Duration::from_millis(5));
        let handle = tokio::spawn(async move { worker.run(rx).await });

        let done = svc
            .wait_for_job(&job.id, Duration::from_millis(5), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
