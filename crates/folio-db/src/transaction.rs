//! Serializable transactions over the repositories.
//!
//! The closure receives a [`Repos`] bound to the transaction's connection and
//! decides the outcome: commit, or roll back while still returning a value.
//! An `Err` from the closure always rolls back.
//!
//! Transactions do not nest. Each one begins `IMMEDIATE` on its own
//! connection, taking the write lock up front, so transactions are applied
//! one after another. A transaction started inside another waits for the
//! outer one (or fails with a busy error), it is never merged into it.
//! In-memory databases get the same behavior from an async mutex, since
//! their transactions share one connection.

use std::future::Future;

use libsql::TransactionBehavior;

use crate::error::DatabaseError;
use crate::repos::Repos;
use crate::retry::is_lock_contention;
use crate::FolioDb;

/// What to do with the transaction once the closure returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    Commit,
    Rollback,
}

/// Closure result: the action to take and the value to hand back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome<T> {
    pub action: TxAction,
    pub value: T,
}

impl<T> TxOutcome<T> {
    pub const fn commit(value: T) -> Self {
        Self {
            action: TxAction::Commit,
            value,
        }
    }

    pub const fn rollback(value: T) -> Self {
        Self {
            action: TxAction::Rollback,
            value,
        }
    }
}

impl FolioDb {
    /// Run `f` inside one serializable transaction.
    ///
    /// # Errors
    ///
    /// Returns the closure's error (after rolling back), or a
    /// `DatabaseError` converted into `E` if the transaction cannot begin or
    /// the commit fails.
    pub async fn run_in_serializable_transaction<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Repos) -> Fut,
        Fut: Future<Output = Result<TxOutcome<T>, E>>,
        E: From<DatabaseError>,
    {
        let _slot = self.memory_transaction_slot().await?;
        let conn = self.transaction_connection().await?;
        let tx = self.begin_immediate(&conn).await?;

        match f(Repos::new(conn.clone())).await {
            Ok(TxOutcome {
                action: TxAction::Commit,
                value,
            }) => {
                tx.commit().await.map_err(DatabaseError::from)?;
                Ok(value)
            }
            Ok(TxOutcome {
                action: TxAction::Rollback,
                value,
            }) => {
                tx.rollback().await.map_err(DatabaseError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback after failed transaction body");
                }
                Err(e)
            }
        }
    }

    async fn begin_immediate(
        &self,
        conn: &libsql::Connection,
    ) -> Result<libsql::Transaction, DatabaseError> {
        let mut attempt = 1;
        loop {
            match conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .await
            {
                Ok(tx) => return Ok(tx),
                Err(e) if is_lock_contention(&e) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(attempt, delay_ms = delay.as_millis(), "write lock busy, retrying begin");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
