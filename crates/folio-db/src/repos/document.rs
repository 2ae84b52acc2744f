//! Document repository: stable identities and their latest-version pointer.

use chrono::{DateTime, Utc};
use folio_core::entities::Document;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, parse_datetime};

const SELECT_COLS: &str = "id, collection_id, latest_version_id, created_at, updated_at";

fn row_to_document(row: &libsql::Row) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        latest_version_id: row.get(2)?,
        created_at: parse_datetime(&row.get::<String>(3)?)?,
        updated_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

pub struct DocumentRepo<'a> {
    conn: &'a libsql::Connection,
}

impl<'a> DocumentRepo<'a> {
    pub(crate) const fn new(conn: &'a libsql::Connection) -> Self {
        Self { conn }
    }

    /// Insert a document row. Its first version must be inserted in the same
    /// transaction.
    pub async fn insert(&self, document: &Document) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                &format!("INSERT INTO documents ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                libsql::params![
                    document.id.as_str(),
                    document.collection_id.as_str(),
                    document.latest_version_id.as_str(),
                    format_datetime(&document.created_at),
                    format_datetime(&document.updated_at)
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn find(&self, id: &str) -> Result<Option<Document>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM documents WHERE id = ?1"),
                [id],
            )
            .await?;
        rows.next().await?.map(|row| row_to_document(&row)).transpose()
    }

    pub async fn list_for_collection(&self, collection_id: &str) -> Result<Vec<Document>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM documents
                     WHERE collection_id = ?1 ORDER BY created_at, rowid"
                ),
                [collection_id],
            )
            .await?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next().await? {
            documents.push(row_to_document(&row)?);
        }
        Ok(documents)
    }

    /// Ids of documents whose latest version conforms to `collection_version_id`.
    pub async fn ids_at_version(&self, collection_version_id: &str) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT d.id FROM documents d
                 JOIN document_versions v ON v.id = d.latest_version_id
                 WHERE v.collection_version_id = ?1
                 ORDER BY d.created_at, d.rowid",
                [collection_version_id],
            )
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    /// Point the document at a newly inserted version.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if the document does not exist.
    pub async fn advance_latest(
        &self,
        document_id: &str,
        version_id: &str,
        updated_at: &DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn
            .execute(
                "UPDATE documents SET latest_version_id = ?2, updated_at = ?3 WHERE id = ?1",
                libsql::params![document_id, version_id, format_datetime(updated_at)],
            )
            .await?;
        if affected == 0 {
            return Err(DatabaseError::NoResult);
        }
        Ok(())
    }

    /// Delete a document and all its versions.
    pub async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", [id])
            .await?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DatabaseError;
    use crate::test_support::helpers::{
        seed_collection, seed_document, seed_root_version, seed_successor_version, test_db,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn ids_at_version_follows_latest_pointer() {
        let db = test_db().await;
        let repos = db.repos();
        let col = seed_collection(&repos, "people").await.unwrap();
        let v1 = seed_root_version(&repos, &col.id).await.unwrap();
        let v2 = seed_successor_version(&repos, &v1).await.unwrap();

        let (ada, _) = seed_document(&repos, &v1, json!({"name": "Ada"})).await.unwrap();
        let (alan, _) = seed_document(&repos, &v1, json!({"name": "Alan"})).await.unwrap();

        assert_eq!(
            repos.documents().ids_at_version(&v1.id).await.unwrap(),
            vec![ada.id.clone(), alan.id.clone()]
        );
        assert!(repos.documents().ids_at_version(&v2.id).await.unwrap().is_empty());

        // Move Ada to v2 by hand.
        let mut migrated = repos
            .document_versions()
            .find(&ada.latest_version_id)
            .await
            .unwrap()
            .unwrap();
        migrated.id = repos.generate_id("dov").await.unwrap();
        migrated.collection_version_id = v2.id.clone();
        repos.document_versions().insert(&migrated).await.unwrap();
        repos
            .documents()
            .advance_latest(&ada.id, &migrated.id, &crate::helpers::now())
            .await
            .unwrap();

        assert_eq!(repos.documents().ids_at_version(&v1.id).await.unwrap(), vec![alan.id]);
        assert_eq!(repos.documents().ids_at_version(&v2.id).await.unwrap(), vec![ada.id]);
    }

    #[tokio::test]
    async fn advance_latest_on_missing_document() {
        let db = test_db().await;
        let result = db
            .repos()
            .documents()
            .advance_latest("doc-missing", "dov-1", &crate::helpers::now())
            .await;
        assert!(matches!(result, Err(DatabaseError::NoResult)));
    }

    #[tokio::test]
    async fn delete_cascades_to_versions() {
        let db = test_db().await;
        let repos = db.repos();
        let col = seed_collection(&repos, "people").await.unwrap();
        let v1 = seed_root_version(&repos, &col.id).await.unwrap();
        let (doc, version) = seed_document(&repos, &v1, json!({"name": "Ada"})).await.unwrap();

        assert!(repos.documents().delete(&doc.id).await.unwrap());
        assert!(repos.document_versions().find(&version.id).await.unwrap().is_none());
        assert!(repos.documents().list_for_collection(&col.id).await.unwrap().is_empty());
    }
}
