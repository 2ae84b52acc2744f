//! Job handlers.
//!
//! A handler never returns an error: whatever happens becomes the job's
//! terminal [`JobOutcome`].

use folio_core::entities::BackgroundJob;
use folio_core::jobs::{DeleteCollectionInput, JobError, JobPayload, MigrateCollectionInput};
use folio_db::TxOutcome;
use folio_db::repos::JobOutcome;
use serde_json::json;

use crate::error::{EngineError, MigrationError};
use crate::migration::MigrationOrchestrator;
use crate::service::FolioService;

/// Run the handler for a claimed job.
pub async fn dispatch(service: &FolioService, job: &BackgroundJob) -> JobOutcome {
    let payload = match job.payload() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(job_id = %job.id, kind = %job.kind, error = %e, "undecodable job payload");
            return failed(JobError::Internal {
                message: e.to_string(),
            });
        }
    };

    match payload {
        JobPayload::MigrateCollection(input) => migrate_collection(service, job, &input).await,
        JobPayload::DeleteCollection(input) => delete_collection(service, &input).await,
    }
}

async fn migrate_collection(service: &FolioService, job: &BackgroundJob, input: &MigrateCollectionInput) -> JobOutcome {
    let result = MigrationOrchestrator::new(service)
        .reporting_to(job)
        .run(&input.collection_version_id)
        .await;
    match result {
        Ok(report) => match serde_json::to_value(&report) {
            Ok(output) => JobOutcome::Succeeded { output: Some(output) },
            Err(e) => failed(JobError::Internal {
                message: format!("serialize migration report: {e}"),
            }),
        },
        Err(MigrationError::Failed(failure)) => failed(JobError::MigrationFailed { failure }),
        Err(MigrationError::Rejected(message)) => failed(JobError::Rejected { message }),
        Err(MigrationError::Engine(e)) => failed(JobError::Internal {
            message: e.to_string(),
        }),
    }
}

/// Delete a collection with its versions and documents. Deleting a
/// collection that is already gone succeeds.
async fn delete_collection(service: &FolioService, input: &DeleteCollectionInput) -> JobOutcome {
    let collection_id = input.collection_id.as_str();
    let deleted = service
        .db()
        .run_in_serializable_transaction(|repos| async move {
            let deleted = repos.collections().delete(collection_id).await?;
            Ok::<_, EngineError>(TxOutcome::commit(deleted))
        })
        .await;
    match deleted {
        Ok(deleted) => {
            tracing::info!(collection_id, deleted, "collection deleted");
            JobOutcome::Succeeded {
                output: Some(json!({ "collection_id": collection_id, "deleted": deleted })),
            }
        }
        Err(e) => failed(JobError::Internal {
            message: e.to_string(),
        }),
    }
}

const fn failed(error: JobError) -> JobOutcome {
    JobOutcome::Failed { error }
}
