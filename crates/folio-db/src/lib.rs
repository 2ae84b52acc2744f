//! # folio-db
//!
//! libSQL persistence for Folio: collections and their version chains,
//! documents and their version chains, and the background job queue.
//!
//! Repositories are narrow per-entity views over one connection, bundled in
//! [`Repos`]. Writes that must land together go through
//! [`FolioDb::run_in_serializable_transaction`].

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod retry;
pub mod transaction;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use error::DatabaseError;
use folio_config::DatabaseConfig;
use libsql::Builder;

pub use repos::Repos;
pub use retry::RetryConfig;
pub use transaction::{TxAction, TxOutcome};

/// Central database handle for all Folio state.
///
/// Owns the libSQL database and a primary connection used for plain reads
/// and single-statement writes. Transactions get a connection of their own,
/// except for `":memory:"` databases, where every connection would see a
/// different empty database.
///
/// On `":memory:"` all transactions share the primary connection, so they
/// are serialized through `memory_tx` instead of the file lock. Plain reads
/// through [`FolioDb::repos`] run on that same connection and can observe a
/// transaction another task has open; writes that must not join one go
/// through a transaction.
pub struct FolioDb {
    db: libsql::Database,
    conn: libsql::Connection,
    busy_timeout: Duration,
    in_memory: bool,
    memory_tx: tokio::sync::Mutex<()>,
    retry: RetryConfig,
}

impl std::fmt::Debug for FolioDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolioDb")
            .field("busy_timeout", &self.busy_timeout)
            .field("in_memory", &self.in_memory)
            .finish_non_exhaustive()
    }
}

impl FolioDb {
    /// Open the database described by `config`.
    ///
    /// Creates the parent directory of an on-disk database and runs
    /// migrations on every open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let in_memory = config.is_in_memory();
        if !in_memory {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        DatabaseError::Other(anyhow::anyhow!(
                            "create database directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
        }

        let db = Builder::new_local(&config.path).build().await?;
        let conn = db.connect()?;
        configure_connection(&conn, config.busy_timeout(), in_memory).await?;

        let folio_db = Self {
            db,
            conn,
            busy_timeout: config.busy_timeout(),
            in_memory,
            memory_tx: tokio::sync::Mutex::new(()),
            retry: RetryConfig::default(),
        };
        folio_db.run_migrations().await?;
        tracing::debug!(path = %config.path, "database opened");
        Ok(folio_db)
    }

    /// Open a local database at the given path with default settings.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        Self::open(&DatabaseConfig::at(path)).await
    }

    /// Override the lock-contention retry used when beginning transactions.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Access the primary libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Repositories over the primary connection (outside any transaction).
    #[must_use]
    pub fn repos(&self) -> Repos {
        Repos::new(self.conn.clone())
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"doc-a3f8b2c1"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        self.repos().generate_id(prefix).await
    }

    /// Wait for the in-memory transaction slot, giving up after the busy
    /// timeout like a file database would. `None` for file databases.
    async fn memory_transaction_slot(
        &self,
    ) -> Result<Option<tokio::sync::MutexGuard<'_, ()>>, DatabaseError> {
        if !self.in_memory {
            return Ok(None);
        }
        tokio::time::timeout(self.busy_timeout, self.memory_tx.lock())
            .await
            .map(Some)
            .map_err(|_| DatabaseError::Busy("another transaction is open on the in-memory database".into()))
    }

    /// A connection for one transaction.
    async fn transaction_connection(&self) -> Result<libsql::Connection, DatabaseError> {
        if self.in_memory {
            return Ok(self.conn.clone());
        }
        let conn = self.db.connect()?;
        configure_connection(&conn, self.busy_timeout, false).await?;
        Ok(conn)
    }
}

/// Per-connection pragmas: foreign keys, busy timeout, WAL for files.
///
/// Pragmas that report their new value are run through `query`; `execute`
/// rejects statements that return rows.
async fn configure_connection(
    conn: &libsql::Connection,
    busy_timeout: Duration,
    in_memory: bool,
) -> Result<(), DatabaseError> {
    conn.execute("PRAGMA foreign_keys = ON", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

    let ms = busy_timeout.as_millis();
    conn.query(&format!("PRAGMA busy_timeout = {ms}"), ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("PRAGMA busy_timeout: {e}")))?;

    if !in_memory {
        conn.query("PRAGMA journal_mode = WAL", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA journal_mode: {e}")))?;
    }
    Ok(())
}
