//! Database configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_path() -> String {
    ".folio/folio.db".to_string()
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file, or `":memory:"`.
    #[serde(default = "default_path")]
    pub path: String,

    /// How long a connection waits for a competing writer before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Config for an on-disk database at `path` with default timeouts.
    #[must_use]
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = DatabaseConfig::default();
        assert_eq!(config.path, ".folio/folio.db");
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(!config.is_in_memory());
        assert!(DatabaseConfig::at(":memory:").is_in_memory());
    }
}
