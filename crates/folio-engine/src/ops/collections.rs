//! Collections and their version chains.

use folio_core::entities::{BackgroundJob, Collection, CollectionVersion, Getters};
use folio_core::enums::ArtifactKind;
use folio_core::ids::{PREFIX_COLLECTION, PREFIX_COLLECTION_VERSION};
use folio_core::jobs::{DeleteCollectionInput, JobPayload, MigrateCollectionInput};
use folio_core::script::ScriptModule;
use folio_db::TxOutcome;
use folio_db::helpers::now;
use folio_schema::CompiledSchema;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::execution::exports_function;
use crate::service::FolioService;

/// The user-supplied parts of a collection version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCollectionVersion {
    pub schema: serde_json::Value,
    pub getters: Getters,
    /// Required for every version except the first.
    pub migration: Option<ScriptModule>,
}

impl FolioService {
    /// Create a collection together with its root version.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Rejected` if the version carries a migration, a
    /// getter is not a function, or the schema does not compile.
    pub async fn create_collection(
        &self,
        name: &str,
        root: NewCollectionVersion,
    ) -> Result<(Collection, CollectionVersion), EngineError> {
        if root.migration.is_some() {
            return Err(EngineError::Rejected(
                "the first version of a collection has nothing to migrate from".into(),
            ));
        }
        self.preflight(&root).await?;

        let (collection, version) = self
            .db()
            .run_in_serializable_transaction(|repos| async move {
                let created_at = now();
                let collection = Collection {
                    id: repos.generate_id(PREFIX_COLLECTION).await?,
                    name: name.to_string(),
                    created_at,
                };
                let version = CollectionVersion {
                    id: repos.generate_id(PREFIX_COLLECTION_VERSION).await?,
                    collection_id: collection.id.clone(),
                    previous_version_id: None,
                    schema: root.schema,
                    getters: root.getters,
                    migration: None,
                    created_at,
                };
                repos.collections().insert(&collection).await?;
                repos.collection_versions().insert(&version).await?;
                Ok::<_, EngineError>(TxOutcome::commit((collection, version)))
            })
            .await?;

        tracing::info!(collection_id = %collection.id, collection_name = name, "collection created");
        Ok((collection, version))
    }

    /// Append a version to a collection's chain and enqueue the migration of
    /// its documents, both in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Rejected` if the migration is missing or any
    /// module is not a function or the schema does not compile, and a
    /// not-found error if the collection does not exist.
    pub async fn create_collection_version(
        &self,
        collection_id: &str,
        next: NewCollectionVersion,
    ) -> Result<(CollectionVersion, BackgroundJob), EngineError> {
        let Some(migration) = next.migration.clone() else {
            return Err(EngineError::Rejected(
                "a new collection version needs a migration from its predecessor".into(),
            ));
        };
        self.get_collection(collection_id).await?;
        self.preflight(&next).await?;

        let (version, job) = self
            .db()
            .run_in_serializable_transaction(|repos| async move {
                let head = repos
                    .collection_versions()
                    .latest_for_collection(collection_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("collection version", collection_id))?;
                let created_at = now();
                let version = CollectionVersion {
                    id: repos.generate_id(PREFIX_COLLECTION_VERSION).await?,
                    collection_id: collection_id.to_string(),
                    previous_version_id: Some(head.id),
                    schema: next.schema,
                    getters: next.getters,
                    migration: Some(migration),
                    created_at,
                };
                repos.collection_versions().insert(&version).await?;
                let job = repos
                    .jobs()
                    .enqueue(
                        &JobPayload::MigrateCollection(MigrateCollectionInput {
                            collection_version_id: version.id.clone(),
                        }),
                        created_at,
                    )
                    .await?;
                Ok::<_, EngineError>(TxOutcome::commit((version, job)))
            })
            .await?;

        tracing::info!(
            collection_id,
            version_id = %version.id,
            job_id = %job.id,
            "collection version created, migration enqueued"
        );
        Ok((version, job))
    }

    /// # Errors
    ///
    /// Returns a not-found error if the collection does not exist.
    pub async fn get_collection(&self, id: &str) -> Result<Collection, EngineError> {
        self.db()
            .repos()
            .collections()
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("collection", id))
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>, EngineError> {
        Ok(self.db().repos().collections().list().await?)
    }

    /// # Errors
    ///
    /// Returns a not-found error if the version does not exist.
    pub async fn get_collection_version(&self, id: &str) -> Result<CollectionVersion, EngineError> {
        self.db()
            .repos()
            .collection_versions()
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("collection version", id))
    }

    /// Versions of a collection, root first.
    pub async fn list_collection_versions(
        &self,
        collection_id: &str,
    ) -> Result<Vec<CollectionVersion>, EngineError> {
        self.get_collection(collection_id).await?;
        Ok(self
            .db()
            .repos()
            .collection_versions()
            .list_for_collection(collection_id)
            .await?)
    }

    /// The head of a collection's version chain.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the collection does not exist.
    pub async fn latest_collection_version(
        &self,
        collection_id: &str,
    ) -> Result<CollectionVersion, EngineError> {
        self.db()
            .repos()
            .collection_versions()
            .latest_for_collection(collection_id)
            .await?
            .ok_or_else(|| EngineError::not_found("collection", collection_id))
    }

    /// Enqueue the deletion of a collection and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the collection does not exist.
    pub async fn delete_collection(&self, id: &str) -> Result<BackgroundJob, EngineError> {
        self.get_collection(id).await?;
        let payload = JobPayload::DeleteCollection(DeleteCollectionInput {
            collection_id: id.to_string(),
        });
        let job = self.enqueue_job(&payload).await?;
        tracing::info!(collection_id = id, job_id = %job.id, "collection deletion enqueued");
        Ok(job)
    }

    /// Reject a version whose modules are not functions or whose schema does
    /// not compile.
    async fn preflight(&self, version: &NewCollectionVersion) -> Result<(), EngineError> {
        CompiledSchema::compile(&version.schema)
            .map_err(|e| EngineError::Rejected(format!("schema does not compile: {e}")))?;

        for kind in ArtifactKind::ALL {
            let module = version.getters.module(kind);
            if !exports_function(self.sandbox(), module).await {
                return Err(EngineError::Rejected(format!(
                    "{kind} getter '{module}' does not default-export a function"
                )));
            }
        }
        if let Some(migration) = &version.migration {
            if !exports_function(self.sandbox(), migration).await {
                return Err(EngineError::Rejected(format!(
                    "migration '{migration}' does not default-export a function"
                )));
            }
        }
        Ok(())
    }
}
