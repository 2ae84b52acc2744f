//! Background job engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_stuck_after_secs() -> u64 {
    3_600
}

/// What to do with a job left `processing` by a crashed worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StuckJobPolicy {
    /// Leave it alone; an operator decides.
    #[default]
    Manual,
    /// Put it back in the queue once it is older than the threshold.
    Requeue,
    /// Complete it as failed once it is older than the threshold.
    Fail,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Delay between claim attempts when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub stuck_job_policy: StuckJobPolicy,

    /// Age after which a `processing` job counts as stuck.
    #[serde(default = "default_stuck_after_secs")]
    pub stuck_after_secs: u64,
}

impl JobsConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn stuck_after(&self) -> Duration {
        Duration::from_secs(self.stuck_after_secs)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stuck_job_policy: StuckJobPolicy::default(),
            stuck_after_secs: default_stuck_after_secs(),
        }
    }
}
