//! Collection migration orchestrator.
//!
//! Moves every document whose latest version sits at a collection version's
//! predecessor onto that version. Documents are independent: each one is
//! migrated, skipped, or failed on its own, and each successful document is
//! committed in its own transaction before the next one starts. The outcomes
//! are partitioned once every document has been attempted.
//!
//! The migration function and the getters run outside the write
//! transaction. The transaction only re-checks that the document still
//! points at the version that was migrated, so a concurrent update turns the
//! document into a skip instead of being overwritten.

use folio_core::entities::{BackgroundJob, CollectionVersion, DocumentVersion};
use folio_core::jobs::JobProgress;
use folio_core::migration::{
    DocumentMigrationFailure, MigratedDocument, MigrationFailure, MigrationFailureCause, MigrationReport,
};
use folio_core::script::ScriptModule;
use folio_db::TxOutcome;
use folio_db::helpers::now;
use folio_schema::CompiledSchema;

use crate::derivation::derive_artifacts;
use crate::error::{EngineError, MigrationError};
use crate::execution::{execute, exports_function};
use crate::ops::documents::new_version;
use crate::service::FolioService;

/// What happened to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DocumentOutcome {
    Migrated(MigratedDocument),
    /// The document no longer sits at the source version.
    Skipped(String),
    Failed(DocumentMigrationFailure),
}

/// Everything resolved before the first document is touched.
struct Plan {
    target: CollectionVersion,
    from_version_id: String,
    migration: ScriptModule,
    schema: CompiledSchema,
}

pub struct MigrationOrchestrator<'a> {
    service: &'a FolioService,
    job: Option<&'a BackgroundJob>,
}

impl<'a> MigrationOrchestrator<'a> {
    #[must_use]
    pub const fn new(service: &'a FolioService) -> Self {
        Self { service, job: None }
    }

    /// Write progress snapshots onto this claimed job after each document.
    #[must_use]
    pub const fn reporting_to(mut self, job: &'a BackgroundJob) -> Self {
        self.job = Some(job);
        self
    }

    /// Migrate every document at the predecessor of `target_version_id`.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Rejected` if the target version is missing,
    /// has no predecessor, or its migration or schema is unusable, and
    /// `MigrationError::Failed` listing every document that could not be
    /// migrated. Documents migrated before a failure stay migrated.
    pub async fn run(&self, target_version_id: &str) -> Result<MigrationReport, MigrationError> {
        let plan = self.plan(target_version_id).await?;
        let document_ids = self
            .service
            .db()
            .repos()
            .documents()
            .ids_at_version(&plan.from_version_id)
            .await?;

        tracing::info!(
            collection_id = %plan.target.collection_id,
            from = %plan.from_version_id,
            to = %plan.target.id,
            documents = document_ids.len(),
            "migration started"
        );

        let mut progress = JobProgress {
            total: document_ids.len() as u64,
            ..JobProgress::default()
        };
        let mut outcomes = Vec::with_capacity(document_ids.len());
        for document_id in &document_ids {
            let outcome = self.migrate_document(&plan, document_id).await;
            progress.processed += 1;
            match &outcome {
                DocumentOutcome::Migrated(_) => progress.migrated += 1,
                DocumentOutcome::Skipped(_) => progress.skipped += 1,
                DocumentOutcome::Failed(failure) => {
                    progress.failed += 1;
                    tracing::warn!(
                        document_id = %failure.document_id,
                        cause = %failure.cause,
                        "document migration failed"
                    );
                }
            }
            outcomes.push(outcome);
            self.report_progress(&progress).await;
        }

        partition(&plan, outcomes)
    }

    async fn plan(&self, target_version_id: &str) -> Result<Plan, MigrationError> {
        let target = self
            .service
            .db()
            .repos()
            .collection_versions()
            .find(target_version_id)
            .await?
            .ok_or_else(|| {
                MigrationError::Rejected(format!("collection version {target_version_id} does not exist"))
            })?;
        let Some(from_version_id) = target.previous_version_id.clone() else {
            return Err(MigrationError::Rejected(format!(
                "collection version {target_version_id} is a root version"
            )));
        };
        let Some(migration) = target.migration.clone() else {
            return Err(MigrationError::Rejected(format!(
                "collection version {target_version_id} has no migration"
            )));
        };
        if !exports_function(self.service.sandbox(), &migration).await {
            return Err(MigrationError::Rejected(format!(
                "migration '{migration}' does not default-export a function"
            )));
        }
        let schema = CompiledSchema::compile(&target.schema)
            .map_err(|e| MigrationError::Rejected(format!("target schema does not compile: {e}")))?;

        Ok(Plan {
            target,
            from_version_id,
            migration,
            schema,
        })
    }

    async fn migrate_document(&self, plan: &Plan, document_id: &str) -> DocumentOutcome {
        let failed = |cause| {
            DocumentOutcome::Failed(DocumentMigrationFailure {
                document_id: document_id.to_string(),
                cause,
            })
        };

        let source = match self.source_version(plan, document_id).await {
            Ok(Some(source)) => source,
            Ok(None) => return DocumentOutcome::Skipped(document_id.to_string()),
            Err(e) => return failed(MigrationFailureCause::PersistFailed { message: e.to_string() }),
        };

        let content = match execute(self.service.sandbox(), &plan.migration, vec![source.content.clone()]).await {
            Ok(content) => content,
            Err(failure) => return failed(MigrationFailureCause::ApplyingMigrationFailed { failure }),
        };
        if let Err(issues) = plan.schema.validate(&content) {
            return failed(MigrationFailureCause::ContentNotValid { issues });
        }
        let artifacts = derive_artifacts(
            self.service.sandbox(),
            self.service.shapes(),
            &plan.target.getters,
            &content,
        )
        .await;

        let persisted = self
            .service
            .db()
            .run_in_serializable_transaction(|repos| async move {
                let current = repos.documents().find(document_id).await?;
                if current.is_none_or(|doc| doc.latest_version_id != source.id) {
                    return Ok(TxOutcome::rollback(DocumentOutcome::Skipped(document_id.to_string())));
                }
                let created_at = now();
                let version = new_version(&repos, document_id, &plan.target.id, content, artifacts, created_at).await?;
                repos.document_versions().insert(&version).await?;
                repos
                    .documents()
                    .advance_latest(document_id, &version.id, &created_at)
                    .await?;
                Ok::<_, EngineError>(TxOutcome::commit(DocumentOutcome::Migrated(MigratedDocument {
                    document_id: document_id.to_string(),
                    version_id: version.id,
                })))
            })
            .await;

        persisted.unwrap_or_else(|e| failed(MigrationFailureCause::PersistFailed { message: e.to_string() }))
    }

    /// The document's latest version, if it still sits at the source version.
    async fn source_version(&self, plan: &Plan, document_id: &str) -> Result<Option<DocumentVersion>, EngineError> {
        let latest = self
            .service
            .db()
            .repos()
            .document_versions()
            .latest_for_document(document_id)
            .await?;
        Ok(latest.filter(|v| v.collection_version_id == plan.from_version_id))
    }

    async fn report_progress(&self, progress: &JobProgress) {
        let Some((job_id, claim_token)) = self
            .job
            .and_then(|job| Some((job.id.as_str(), job.claim_token.as_deref()?)))
        else {
            return;
        };
        let recorded = self
            .service
            .db()
            .run_in_serializable_transaction(|repos| async move {
                let recorded = repos.jobs().record_progress(job_id, claim_token, progress).await?;
                Ok::<_, EngineError>(TxOutcome::commit(recorded))
            })
            .await;
        match recorded {
            Ok(true) => {}
            Ok(false) => tracing::debug!(job_id, "progress not recorded, claim is no longer current"),
            Err(e) => tracing::warn!(job_id, error = %e, "failed to record migration progress"),
        }
    }
}

fn partition(plan: &Plan, outcomes: Vec<DocumentOutcome>) -> Result<MigrationReport, MigrationError> {
    let mut migrated = Vec::new();
    let mut skipped = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            DocumentOutcome::Migrated(doc) => migrated.push(doc),
            DocumentOutcome::Skipped(id) => skipped.push(id),
            DocumentOutcome::Failed(failure) => failures.push(failure),
        }
    }

    let collection_id = plan.target.collection_id.clone();
    let from_version_id = plan.from_version_id.clone();
    let to_version_id = plan.target.id.clone();
    tracing::info!(
        %collection_id,
        migrated = migrated.len(),
        skipped = skipped.len(),
        failed = failures.len(),
        "migration finished"
    );

    if failures.is_empty() {
        Ok(MigrationReport {
            collection_id,
            from_version_id,
            to_version_id,
            migrated,
            skipped,
        })
    } else {
        Err(MigrationError::Failed(MigrationFailure {
            collection_id,
            from_version_id,
            to_version_id,
            migrated: migrated.len() as u64,
            skipped: skipped.len() as u64,
            failures,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{people_sandbox, people_v1, people_v2, test_service};
    use folio_config::FolioConfig;
    use folio_core::enums::ExecutionFailureKind;
    use folio_db::FolioDb;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex, mpsc};
    use std::time::Duration;

    async fn people_with(svc: &FolioService, names: &[&str]) -> String {
        let (collection, _) = svc.create_collection("people", people_v1()).await.unwrap();
        for name in names {
            svc.create_document(&collection.id, json!({"name": name})).await.unwrap();
        }
        collection.id
    }

    #[tokio::test]
    async fn migrates_every_document() {
        let svc = test_service().await;
        let collection_id = people_with(&svc, &["Ada", "Grace"]).await;
        let (v2, _) = svc
            .create_collection_version(&collection_id, people_v2("add-age"))
            .await
            .unwrap();

        let report = MigrationOrchestrator::new(&svc).run(&v2.id).await.unwrap();
        assert_eq!(report.migrated.len(), 2);
        assert!(report.skipped.is_empty());
        for doc in &report.migrated {
            let latest = svc.latest_document_version(&doc.document_id).await.unwrap();
            assert_eq!(latest.id, doc.version_id);
            assert_eq!(latest.collection_version_id, v2.id);
            assert_eq!(latest.content["age"], json!(0));
        }
    }

    #[tokio::test]
    async fn invalid_result_is_a_document_failure() {
        let svc = test_service().await;
        let collection_id = people_with(&svc, &["Ada"]).await;
        let (v2, _) = svc
            .create_collection_version(&collection_id, people_v2("drop-name"))
            .await
            .unwrap();

        let Err(MigrationError::Failed(failure)) = MigrationOrchestrator::new(&svc).run(&v2.id).await else {
            panic!("migration should fail");
        };
        assert_eq!(failure.migrated, 0);
        assert_eq!(failure.failures.len(), 1);
        assert!(matches!(
            failure.failures[0].cause,
            MigrationFailureCause::ContentNotValid { .. }
        ));
    }

    #[tokio::test]
    async fn throwing_migration_reports_runtime_failure() {
        let svc = test_service().await;
        let collection_id = people_with(&svc, &["Ada"]).await;
        let (v2, _) = svc
            .create_collection_version(&collection_id, people_v2("throws"))
            .await
            .unwrap();

        let Err(MigrationError::Failed(failure)) = MigrationOrchestrator::new(&svc).run(&v2.id).await else {
            panic!("migration should fail");
        };
        let MigrationFailureCause::ApplyingMigrationFailed { failure: exec } = &failure.failures[0].cause else {
            panic!("unexpected cause {:?}", failure.failures[0].cause);
        };
        assert_eq!(exec.kind, ExecutionFailureKind::Runtime);
    }

    #[tokio::test]
    async fn root_and_missing_versions_rejected() {
        let svc = test_service().await;
        let (collection, root) = svc.create_collection("people", people_v1()).await.unwrap();
        svc.create_document(&collection.id, json!({"name": "Ada"})).await.unwrap();

        let orchestrator = MigrationOrchestrator::new(&svc);
        assert!(matches!(orchestrator.run(&root.id).await, Err(MigrationError::Rejected(_))));
        assert!(matches!(orchestrator.run("cov-missing").await, Err(MigrationError::Rejected(_))));
    }

    #[tokio::test]
    async fn non_function_migration_rejected_before_touching_documents() {
        let svc = test_service().await;
        let collection_id = people_with(&svc, &["Ada"]).await;
        let head = svc.latest_collection_version(&collection_id).await.unwrap();

        // Bypass the service's pre-flight to store an unusable migration.
        let v2 = CollectionVersion {
            id: "cov-unusable".into(),
            collection_id: collection_id.clone(),
            previous_version_id: Some(head.id.clone()),
            migration: Some(ScriptModule::new("no-such-module")),
            created_at: now(),
            ..head.clone()
        };
        svc.db().repos().collection_versions().insert(&v2).await.unwrap();

        let result = MigrationOrchestrator::new(&svc).run(&v2.id).await;
        assert!(matches!(result, Err(MigrationError::Rejected(ref m)) if m.contains("no-such-module")));
        let docs = svc.list_documents(&collection_id).await.unwrap();
        let latest = svc.latest_document_version(&docs[0].id).await.unwrap();
        assert_eq!(latest.collection_version_id, head.id);
    }

    #[tokio::test]
    async fn progress_recorded_on_job() {
        let svc = test_service().await;
        let collection_id = people_with(&svc, &["Ada", "Grace", "Barbara"]).await;
        let (v2, job) = svc
            .create_collection_version(&collection_id, people_v2("add-age"))
            .await
            .unwrap();
        let claimed = svc.claim_job(&job.id).await.unwrap().into_claimed().unwrap();

        MigrationOrchestrator::new(&svc)
            .reporting_to(&claimed)
            .run(&v2.id)
            .await
            .unwrap();

        let job = svc.get_job(&job.id).await.unwrap();
        assert_eq!(
            job.progress,
            Some(JobProgress {
                total: 3,
                processed: 3,
                migrated: 3,
                skipped: 0,
                failed: 0,
            })
        );
    }

    #[tokio::test]
    async fn documents_already_past_source_are_not_touched() {
        let svc = test_service().await;
        let collection_id = people_with(&svc, &["Ada"]).await;
        let (v2, _) = svc
            .create_collection_version(&collection_id, people_v2("add-age"))
            .await
            .unwrap();
        let (late, _) = svc
            .create_document(&collection_id, json!({"name": "Grace", "age": 85}))
            .await
            .unwrap();

        let report = MigrationOrchestrator::new(&svc).run(&v2.id).await.unwrap();
        assert_eq!(report.migrated.len(), 1);
        assert_ne!(report.migrated[0].document_id, late.id);
        assert_eq!(svc.list_document_versions(&late.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn document_updated_while_migrating_is_skipped() {
        // The migration pauses after reading the source version until the
        // document has been updated underneath it.
        let (reading_tx, mut reading_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let (updated_tx, updated_rx) = mpsc::channel::<()>();
        let updated_rx = Mutex::new(updated_rx);
        let sandbox = people_sandbox().with_module("add-age-after-update", move |args| {
            let _ = reading_tx.send(());
            updated_rx
                .lock()
                .map_err(|e| e.to_string())?
                .recv_timeout(Duration::from_secs(1))
                .map_err(|e| e.to_string())?;
            let mut doc = args[0].clone();
            doc["age"] = json!(0);
            Ok(doc)
        });
        let db = FolioDb::open_local(":memory:").await.unwrap();
        let svc = FolioService::from_db(db, Arc::new(sandbox), FolioConfig::default());

        let (collection, _) = svc.create_collection("people", people_v1()).await.unwrap();
        let (doc, _) = svc.create_document(&collection.id, json!({"name": "Ada"})).await.unwrap();
        let (v2, _) = svc
            .create_collection_version(&collection.id, people_v2("add-age-after-update"))
            .await
            .unwrap();

        let updater = {
            let svc = svc.clone();
            let doc_id = doc.id.clone();
            tokio::spawn(async move {
                reading_rx.recv().await.unwrap();
                let updated = svc
                    .update_document(&doc_id, json!({"name": "Ada", "age": 36}))
                    .await
                    .unwrap();
                updated_tx.send(()).unwrap();
                updated
            })
        };

        let report = MigrationOrchestrator::new(&svc).run(&v2.id).await.unwrap();
        let (_, concurrent) = updater.await.unwrap();

        assert!(report.migrated.is_empty());
        assert_eq!(report.skipped, vec![doc.id.clone()]);
        let versions = svc.list_document_versions(&doc.id).await.unwrap();
        assert_eq!(versions.len(), 2);
        let latest = svc.latest_document_version(&doc.id).await.unwrap();
        assert_eq!(latest.id, concurrent.id);
        assert_eq!(latest.content, json!({"name": "Ada", "age": 36}));
    }

    #[tokio::test]
    async fn storage_error_while_persisting_is_a_document_failure() {
        let svc = test_service().await;
        let collection_id = people_with(&svc, &["Ada", "Grace"]).await;
        let (v2, _) = svc
            .create_collection_version(&collection_id, people_v2("add-age"))
            .await
            .unwrap();
        svc.db()
            .conn()
            .execute(
                "CREATE TRIGGER refuse_grace BEFORE INSERT ON document_versions
                 WHEN json_extract(NEW.content, '$.name') = 'Grace'
                 BEGIN SELECT RAISE(ABORT, 'storage refused the write'); END",
                (),
            )
            .await
            .unwrap();

        let Err(MigrationError::Failed(failure)) = MigrationOrchestrator::new(&svc).run(&v2.id).await else {
            panic!("migration should fail");
        };
        assert_eq!(failure.migrated, 1);
        assert_eq!(failure.failures.len(), 1);
        assert!(matches!(
            failure.failures[0].cause,
            MigrationFailureCause::PersistFailed { .. }
        ));

        let grace = &failure.failures[0].document_id;
        let latest = svc.latest_document_version(grace).await.unwrap();
        assert_ne!(latest.collection_version_id, v2.id);
        assert_eq!(svc.list_document_versions(grace).await.unwrap().len(), 1);
    }
}
