//! Documents and their version chains.

use chrono::{DateTime, Utc};
use folio_core::derived::DerivedArtifacts;
use folio_core::entities::{CollectionVersion, Document, DocumentVersion};
use folio_core::ids::{PREFIX_DOCUMENT, PREFIX_DOCUMENT_VERSION};
use folio_db::helpers::now;
use folio_db::{Repos, TxOutcome};
use folio_schema::CompiledSchema;
use serde_json::Value;

use crate::derivation::derive_artifacts;
use crate::error::EngineError;
use crate::service::FolioService;

impl FolioService {
    /// Create a document at the collection's latest version.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ContentNotValid` if `content` does not satisfy
    /// the latest schema, and `EngineError::Conflict` if a new collection
    /// version was created while the artifacts were being derived.
    pub async fn create_document(
        &self,
        collection_id: &str,
        content: Value,
    ) -> Result<(Document, DocumentVersion), EngineError> {
        let head = self.latest_collection_version(collection_id).await?;
        let artifacts = self.prepare_content(&head, &content).await?;

        let (document, version) = self
            .db()
            .run_in_serializable_transaction(|repos| async move {
                ensure_head_unchanged(&repos, &head).await?;
                let created_at = now();
                let document_id = repos.generate_id(PREFIX_DOCUMENT).await?;
                let version = new_version(&repos, &document_id, &head.id, content, artifacts, created_at).await?;
                let document = Document {
                    id: document_id,
                    collection_id: head.collection_id.clone(),
                    latest_version_id: version.id.clone(),
                    created_at,
                    updated_at: created_at,
                };
                repos.documents().insert(&document).await?;
                repos.document_versions().insert(&version).await?;
                Ok::<_, EngineError>(TxOutcome::commit((document, version)))
            })
            .await?;

        tracing::info!(document_id = %document.id, collection_id, "document created");
        Ok((document, version))
    }

    /// Append a version to a document at its collection's latest version.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_document`], plus `EngineError::Conflict` if the
    /// document gained another version concurrently.
    pub async fn update_document(
        &self,
        document_id: &str,
        content: Value,
    ) -> Result<(Document, DocumentVersion), EngineError> {
        let document = self.get_document(document_id).await?;
        let head = self.latest_collection_version(&document.collection_id).await?;
        let artifacts = self.prepare_content(&head, &content).await?;

        let (document, version) = self
            .db()
            .run_in_serializable_transaction(|repos| async move {
                ensure_head_unchanged(&repos, &head).await?;
                let current = repos
                    .documents()
                    .find(&document.id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("document", &document.id))?;
                if current.latest_version_id != document.latest_version_id {
                    return Err(EngineError::Conflict(format!(
                        "document {} was updated concurrently",
                        document.id
                    )));
                }

                let updated_at = now();
                let version = new_version(&repos, &document.id, &head.id, content, artifacts, updated_at).await?;
                repos.document_versions().insert(&version).await?;
                repos
                    .documents()
                    .advance_latest(&document.id, &version.id, &updated_at)
                    .await?;
                let document = Document {
                    latest_version_id: version.id.clone(),
                    updated_at,
                    ..current
                };
                Ok::<_, EngineError>(TxOutcome::commit((document, version)))
            })
            .await?;

        tracing::info!(document_id = %document.id, version_id = %version.id, "document updated");
        Ok((document, version))
    }

    /// # Errors
    ///
    /// Returns a not-found error if the document does not exist.
    pub async fn get_document(&self, id: &str) -> Result<Document, EngineError> {
        self.db()
            .repos()
            .documents()
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("document", id))
    }

    /// Documents of a collection, oldest first.
    pub async fn list_documents(&self, collection_id: &str) -> Result<Vec<Document>, EngineError> {
        self.get_collection(collection_id).await?;
        Ok(self.db().repos().documents().list_for_collection(collection_id).await?)
    }

    /// # Errors
    ///
    /// Returns a not-found error if the version does not exist.
    pub async fn get_document_version(&self, id: &str) -> Result<DocumentVersion, EngineError> {
        self.db()
            .repos()
            .document_versions()
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("document version", id))
    }

    pub async fn latest_document_version(&self, document_id: &str) -> Result<DocumentVersion, EngineError> {
        self.db()
            .repos()
            .document_versions()
            .latest_for_document(document_id)
            .await?
            .ok_or_else(|| EngineError::not_found("document", document_id))
    }

    /// Versions of a document in creation order.
    pub async fn list_document_versions(&self, document_id: &str) -> Result<Vec<DocumentVersion>, EngineError> {
        self.get_document(document_id).await?;
        Ok(self
            .db()
            .repos()
            .document_versions()
            .list_for_document(document_id)
            .await?)
    }

    /// Validate `content` against `version`'s schema and derive its
    /// artifacts.
    async fn prepare_content(
        &self,
        version: &CollectionVersion,
        content: &Value,
    ) -> Result<DerivedArtifacts, EngineError> {
        let schema = CompiledSchema::compile(&version.schema)?;
        schema
            .validate(content)
            .map_err(|issues| EngineError::ContentNotValid { issues })?;
        Ok(derive_artifacts(self.sandbox(), self.shapes(), &version.getters, content).await)
    }
}

async fn ensure_head_unchanged(repos: &Repos, expected: &CollectionVersion) -> Result<(), EngineError> {
    let head = repos
        .collection_versions()
        .latest_for_collection(&expected.collection_id)
        .await?;
    match head {
        Some(head) if head.id == expected.id => Ok(()),
        _ => Err(EngineError::Conflict(format!(
            "collection {} moved past version {}",
            expected.collection_id, expected.id
        ))),
    }
}

pub(crate) async fn new_version(
    repos: &Repos,
    document_id: &str,
    collection_version_id: &str,
    content: Value,
    artifacts: DerivedArtifacts,
    created_at: DateTime<Utc>,
) -> Result<DocumentVersion, EngineError> {
    Ok(DocumentVersion {
        id: repos.generate_id(PREFIX_DOCUMENT_VERSION).await?,
        document_id: document_id.to_string(),
        collection_version_id: collection_version_id.to_string(),
        content,
        summary: artifacts.summary,
        fingerprint: artifacts.fingerprint,
        blocking_keys: artifacts.blocking_keys,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{people_v1, people_v2, test_service};
    use folio_core::derived::GetterFailure;
    use folio_core::entities::Getters;
    use folio_core::script::ScriptModule;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn create_document_derives_artifacts() {
        let svc = test_service().await;
        let (collection, root) = svc.create_collection("people", people_v1()).await.unwrap();
        let (document, version) = svc
            .create_document(&collection.id, json!({"name": "Ada Lovelace"}))
            .await
            .unwrap();

        assert_eq!(document.latest_version_id, version.id);
        assert_eq!(version.collection_version_id, root.id);
        assert_eq!(version.fingerprint.value().map(String::as_str), Some("ada lovelace"));
        assert_eq!(svc.latest_document_version(&document.id).await.unwrap(), version);
        assert_eq!(svc.list_documents(&collection.id).await.unwrap(), vec![document]);
    }

    #[tokio::test]
    async fn invalid_content_rejected() {
        let svc = test_service().await;
        let (collection, _) = svc.create_collection("people", people_v1()).await.unwrap();
        let err = svc
            .create_document(&collection.id, json!({"age": 3}))
            .await
            .unwrap_err();
        let EngineError::ContentNotValid { issues } = err else {
            panic!("expected ContentNotValid, got {err:?}");
        };
        assert!(!issues.is_empty());
        assert!(svc.list_documents(&collection.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_appends_version_and_advances_latest() {
        let svc = test_service().await;
        let (collection, _) = svc.create_collection("people", people_v1()).await.unwrap();
        let (document, first) = svc
            .create_document(&collection.id, json!({"name": "Ada"}))
            .await
            .unwrap();
        let (updated, second) = svc
            .update_document(&document.id, json!({"name": "Ada Lovelace"}))
            .await
            .unwrap();

        assert_eq!(updated.latest_version_id, second.id);
        assert!(updated.updated_at >= document.updated_at);
        assert_eq!(updated.created_at, document.created_at);
        let history: Vec<_> = svc
            .list_document_versions(&document.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(history, vec![first.id, second.id.clone()]);
        assert_eq!(svc.get_document(&document.id).await.unwrap(), updated);
        assert_eq!(svc.get_document_version(&second.id).await.unwrap(), second);
    }

    #[tokio::test]
    async fn update_uses_latest_collection_version() {
        let svc = test_service().await;
        let (collection, _) = svc.create_collection("people", people_v1()).await.unwrap();
        let (document, _) = svc
            .create_document(&collection.id, json!({"name": "Ada"}))
            .await
            .unwrap();
        let (v2, _) = svc
            .create_collection_version(&collection.id, people_v2("add-age"))
            .await
            .unwrap();

        let err = svc
            .update_document(&document.id, json!({"name": "Ada"}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ContentNotValid { .. }));

        let (_, version) = svc
            .update_document(&document.id, json!({"name": "Ada", "age": 36}))
            .await
            .unwrap();
        assert_eq!(version.collection_version_id, v2.id);
    }

    #[tokio::test]
    async fn failed_getter_still_stores_document() {
        let svc = test_service().await;
        let mut version = people_v1();
        version.getters = Getters {
            blocking_keys: ScriptModule::new("throws"),
            ..version.getters
        };
        let (collection, _) = svc.create_collection("people", version).await.unwrap();
        let (_, stored) = svc
            .create_document(&collection.id, json!({"name": "Ada"}))
            .await
            .unwrap();

        assert!(matches!(
            stored.blocking_keys.failure(),
            Some(GetterFailure::ExecutionFailed { .. })
        ));
        assert!(stored.summary.is_computed());
        assert_eq!(svc.get_document_version(&stored.id).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn missing_entities_are_not_found() {
        let svc = test_service().await;
        assert!(
            svc.create_document("col-missing", json!({"name": "Ada"}))
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            svc.update_document("doc-missing", json!({"name": "Ada"}))
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(svc.get_document_version("dov-missing").await.unwrap_err().is_not_found());
        assert!(svc.latest_document_version("doc-missing").await.unwrap_err().is_not_found());
    }
}
