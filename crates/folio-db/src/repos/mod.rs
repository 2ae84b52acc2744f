//! Per-entity repositories.
//!
//! Each repository is a narrow view over one connection: `insert`, `find`,
//! scoped finders, and `delete` where the entity can be removed on its own.
//! [`Repos`] bundles them over a single connection, which is what a
//! transaction hands to its closure.

pub mod collection;
pub mod collection_version;
pub mod document;
pub mod document_version;
pub mod job;

use crate::error::DatabaseError;

pub use collection::CollectionRepo;
pub use collection_version::CollectionVersionRepo;
pub use document::DocumentRepo;
pub use document_version::DocumentVersionRepo;
pub use job::{ClaimOutcome, JobOutcome, JobRepo};

/// All repositories over one connection.
#[derive(Clone)]
pub struct Repos {
    conn: libsql::Connection,
}

impl Repos {
    pub(crate) const fn new(conn: libsql::Connection) -> Self {
        Self { conn }
    }

    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    #[must_use]
    pub const fn collections(&self) -> CollectionRepo<'_> {
        CollectionRepo::new(&self.conn)
    }

    #[must_use]
    pub const fn collection_versions(&self) -> CollectionVersionRepo<'_> {
        CollectionVersionRepo::new(&self.conn)
    }

    #[must_use]
    pub const fn documents(&self) -> DocumentRepo<'_> {
        DocumentRepo::new(&self.conn)
    }

    #[must_use]
    pub const fn document_versions(&self) -> DocumentVersionRepo<'_> {
        DocumentVersionRepo::new(&self.conn)
    }

    #[must_use]
    pub const fn jobs(&self) -> JobRepo<'_> {
        JobRepo::new(&self.conn)
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"col-a3f8b2c1"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        generate_id(&self.conn, prefix).await
    }
}

/// Uses `randomblob(4)` in SQL to produce 8-char hex, then prepends the prefix.
pub(crate) async fn generate_id(
    conn: &libsql::Connection,
    prefix: &str,
) -> Result<String, DatabaseError> {
    let mut rows = conn
        .query("SELECT ?1 || '-' || lower(hex(randomblob(4)))", [prefix])
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<String>(0)?)
}
