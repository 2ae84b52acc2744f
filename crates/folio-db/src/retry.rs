//! Retry on write-lock contention.
//!
//! `BEGIN IMMEDIATE` takes the database write lock up front. When another
//! connection holds it for longer than the busy timeout, the begin fails with
//! `SQLITE_BUSY`. Starting the transaction again after a short backoff
//! usually succeeds; nothing has been written yet, so the retry is safe.
//!
//! Only the begin is retried. A busy error inside a transaction surfaces to
//! the caller.

use std::time::Duration;

/// Configuration for retry behavior on lock contention.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (1-based), doubling up to `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Detect `SQLITE_BUSY` / `SQLITE_LOCKED` failures.
///
/// The predicate matches on the message so it holds across libSQL error
/// variants; constraint and syntax errors never match.
pub fn is_lock_contention(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("database is locked") || msg.contains("database table is locked")
}
