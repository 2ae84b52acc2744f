//! Document version repository.
//!
//! Versions are immutable. The three derived artifacts are stored as tagged
//! JSON so a failed getter is cached as faithfully as a computed value.

use folio_core::entities::DocumentVersion;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, parse_datetime, parse_json, to_json_text};

const SELECT_COLS: &str = "id, document_id, collection_version_id, content, summary, fingerprint, \
     blocking_keys, created_at";

fn row_to_version(row: &libsql::Row) -> Result<DocumentVersion, DatabaseError> {
    Ok(DocumentVersion {
        id: row.get(0)?,
        document_id: row.get(1)?,
        collection_version_id: row.get(2)?,
        content: parse_json(&row.get::<String>(3)?)?,
        summary: parse_json(&row.get::<String>(4)?)?,
        fingerprint: parse_json(&row.get::<String>(5)?)?,
        blocking_keys: parse_json(&row.get::<String>(6)?)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
    })
}

/// Same columns, qualified for joins against `documents`.
fn qualified_cols() -> String {
    SELECT_COLS
        .split(", ")
        .map(|col| format!("v.{col}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct DocumentVersionRepo<'a> {
    conn: &'a libsql::Connection,
}

impl<'a> DocumentVersionRepo<'a> {
    pub(crate) const fn new(conn: &'a libsql::Connection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, version: &DocumentVersion) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO document_versions ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                libsql::params![
                    version.id.as_str(),
                    version.document_id.as_str(),
                    version.collection_version_id.as_str(),
                    to_json_text(&version.content)?,
                    to_json_text(&version.summary)?,
                    to_json_text(&version.fingerprint)?,
                    to_json_text(&version.blocking_keys)?,
                    format_datetime(&version.created_at)
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn find(&self, id: &str) -> Result<Option<DocumentVersion>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM document_versions WHERE id = ?1"),
                [id],
            )
            .await?;
        rows.next().await?.map(|row| row_to_version(&row)).transpose()
    }

    /// All versions of a document, oldest first.
    pub async fn list_for_document(&self, document_id: &str) -> Result<Vec<DocumentVersion>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM document_versions
                     WHERE document_id = ?1 ORDER BY created_at, rowid"
                ),
                [document_id],
            )
            .await?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next().await? {
            versions.push(row_to_version(&row)?);
        }
        Ok(versions)
    }

    /// The version the document's latest pointer designates.
    pub async fn latest_for_document(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentVersion>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {} FROM document_versions v
                     JOIN documents d ON d.latest_version_id = v.id
                     WHERE d.id = ?1",
                    qualified_cols()
                ),
                [document_id],
            )
            .await?;
        rows.next().await?.map(|row| row_to_version(&row)).transpose()
    }
}
