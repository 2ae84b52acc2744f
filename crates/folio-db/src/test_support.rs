//! Shared test utilities for folio-db tests.

#[cfg(test)]
pub(crate) mod helpers {
    use folio_core::derived::Derived;
    use folio_core::entities::{Collection, CollectionVersion, Document, DocumentVersion, Getters};
    use folio_core::ids::{
        PREFIX_COLLECTION, PREFIX_COLLECTION_VERSION, PREFIX_DOCUMENT, PREFIX_DOCUMENT_VERSION,
    };
    use folio_core::script::ScriptModule;
    use serde_json::json;

    use crate::FolioDb;
    use crate::error::DatabaseError;
    use crate::helpers::now;
    use crate::repos::Repos;

    /// Create an in-memory database with migrations applied.
    pub async fn test_db() -> FolioDb {
        FolioDb::open_local(":memory:").await.unwrap()
    }

    pub async fn seed_collection(repos: &Repos, name: &str) -> Result<Collection, DatabaseError> {
        let collection = Collection {
            id: repos.generate_id(PREFIX_COLLECTION).await?,
            name: name.to_string(),
            created_at: now(),
        };
        repos.collections().insert(&collection).await?;
        Ok(collection)
    }

    fn getters() -> Getters {
        Getters {
            summary: ScriptModule::new("summary"),
            fingerprint: ScriptModule::new("fingerprint"),
            blocking_keys: ScriptModule::new("blocking_keys"),
        }
    }

    pub async fn seed_root_version(
        repos: &Repos,
        collection_id: &str,
    ) -> Result<CollectionVersion, DatabaseError> {
        let version = CollectionVersion {
            id: repos.generate_id(PREFIX_COLLECTION_VERSION).await?,
            collection_id: collection_id.to_string(),
            previous_version_id: None,
            schema: json!({"type": "object", "required": ["name"]}),
            getters: getters(),
            migration: None,
            created_at: now(),
        };
        repos.collection_versions().insert(&version).await?;
        Ok(version)
    }

    pub async fn seed_successor_version(
        repos: &Repos,
        previous: &CollectionVersion,
    ) -> Result<CollectionVersion, DatabaseError> {
        let version = CollectionVersion {
            id: repos.generate_id(PREFIX_COLLECTION_VERSION).await?,
            collection_id: previous.collection_id.clone(),
            previous_version_id: Some(previous.id.clone()),
            schema: json!({"type": "object", "required": ["name", "age"]}),
            getters: getters(),
            migration: Some(ScriptModule::new("add-age")),
            created_at: now(),
        };
        repos.collection_versions().insert(&version).await?;
        Ok(version)
    }

    /// Insert a document with one version at `version`.
    pub async fn seed_document(
        repos: &Repos,
        version: &CollectionVersion,
        content: serde_json::Value,
    ) -> Result<(Document, DocumentVersion), DatabaseError> {
        let created_at = now();
        let document_id = repos.generate_id(PREFIX_DOCUMENT).await?;
        let document_version = DocumentVersion {
            id: repos.generate_id(PREFIX_DOCUMENT_VERSION).await?,
            document_id: document_id.clone(),
            collection_version_id: version.id.clone(),
            content,
            summary: Derived::computed(serde_json::Map::new()),
            fingerprint: Derived::computed("fp".to_string()),
            blocking_keys: Derived::computed(vec!["k".to_string()]),
            created_at,
        };
        let document = Document {
            id: document_id,
            collection_id: version.collection_id.clone(),
            latest_version_id: document_version.id.clone(),
            created_at,
            updated_at: created_at,
        };
        repos.documents().insert(&document).await?;
        repos.document_versions().insert(&document_version).await?;
        Ok((document, document_version))
    }
}
