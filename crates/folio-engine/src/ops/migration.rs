//! Starting and running collection migrations.

use folio_core::entities::BackgroundJob;
use folio_core::jobs::{JobPayload, MigrateCollectionInput};
use folio_core::migration::MigrationReport;

use crate::error::{EngineError, MigrationError};
use crate::migration::MigrationOrchestrator;
use crate::service::FolioService;

impl FolioService {
    /// Enqueue a migration into `collection_version_id`.
    ///
    /// [`Self::create_collection_version`] already does this; use it to retry
    /// a migration whose job failed.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Rejected` for a root version and a not-found
    /// error if the version does not exist.
    pub async fn start_migration(&self, collection_version_id: &str) -> Result<BackgroundJob, EngineError> {
        let version = self.get_collection_version(collection_version_id).await?;
        if version.is_root() {
            return Err(EngineError::Rejected(format!(
                "collection version {collection_version_id} is a root version"
            )));
        }
        let job = self
            .enqueue_job(&JobPayload::MigrateCollection(MigrateCollectionInput {
                collection_version_id: collection_version_id.to_string(),
            }))
            .await?;
        tracing::info!(collection_version_id, job_id = %job.id, "migration enqueued");
        Ok(job)
    }

    /// Run a migration inline, without a job.
    ///
    /// # Errors
    ///
    /// See [`MigrationOrchestrator::run`].
    pub async fn migrate_collection(&self, collection_version_id: &str) -> Result<MigrationReport, MigrationError> {
        MigrationOrchestrator::new(self).run(collection_version_id).await
    }
}
