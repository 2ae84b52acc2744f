//! Collection version repository: the per-collection version chain.
//!
//! Versions are immutable once inserted. The chain shape (one root, at most
//! one successor per version) is enforced by partial unique indexes, so an
//! insert that would branch the chain fails with a constraint error.

use folio_core::entities::{CollectionVersion, Getters};
use folio_core::script::ScriptModule;

use crate::error::DatabaseError;
use crate::helpers::{format_datetime, get_opt_string, parse_datetime, parse_json, to_json_text};

const SELECT_COLS: &str = "id, collection_id, previous_version_id, schema, summary_getter, \
     fingerprint_getter, blocking_keys_getter, migration, created_at";

fn row_to_version(row: &libsql::Row) -> Result<CollectionVersion, DatabaseError> {
    Ok(CollectionVersion {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        previous_version_id: get_opt_string(row, 2)?,
        schema: parse_json(&row.get::<String>(3)?)?,
        getters: Getters {
            summary: ScriptModule::new(row.get::<String>(4)?),
            fingerprint: ScriptModule::new(row.get::<String>(5)?),
            blocking_keys: ScriptModule::new(row.get::<String>(6)?),
        },
        migration: row.get::<Option<String>>(7)?.map(ScriptModule::new),
        created_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

pub struct CollectionVersionRepo<'a> {
    conn: &'a libsql::Connection,
}

impl<'a> CollectionVersionRepo<'a> {
    pub(crate) const fn new(conn: &'a libsql::Connection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, version: &CollectionVersion) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO collection_versions ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                libsql::params![
                    version.id.as_str(),
                    version.collection_id.as_str(),
                    version.previous_version_id.as_deref(),
                    to_json_text(&version.schema)?,
                    version.getters.summary.source(),
                    version.getters.fingerprint.source(),
                    version.getters.blocking_keys.source(),
                    version.migration.as_ref().map(ScriptModule::source),
                    format_datetime(&version.created_at)
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn find(&self, id: &str) -> Result<Option<CollectionVersion>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLS} FROM collection_versions WHERE id = ?1"),
                [id],
            )
            .await?;
        rows.next().await?.map(|row| row_to_version(&row)).transpose()
    }

    /// All versions of a collection, root first.
    pub async fn list_for_collection(
        &self,
        collection_id: &str,
    ) -> Result<Vec<CollectionVersion>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM collection_versions
                     WHERE collection_id = ?1 ORDER BY created_at, rowid"
                ),
                [collection_id],
            )
            .await?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next().await? {
            versions.push(row_to_version(&row)?);
        }
        Ok(versions)
    }

    /// The head of the chain: the version nothing has been built on yet.
    pub async fn latest_for_collection(
        &self,
        collection_id: &str,
    ) -> Result<Option<CollectionVersion>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM collection_versions v
                     WHERE v.collection_id = ?1
                       AND NOT EXISTS (
                           SELECT 1 FROM collection_versions n WHERE n.previous_version_id = v.id
                       )"
                ),
                [collection_id],
            )
            .await?;
        rows.next().await?.map(|row| row_to_version(&row)).transpose()
    }
}
