//! Configuration for the engine module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the conversion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum simultaneous encodes. No upper bound is enforced.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-job encode timeout in seconds. Unset means a hung encoder holds
    /// its slot indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_timeout_secs: Option<u64>,
}

fn default_max_concurrent() -> usize {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            job_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    /// Sets the maximum simultaneous encodes.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the per-job timeout in seconds.
    pub fn with_job_timeout(mut self, timeout_secs: u64) -> Self {
        self.job_timeout_secs = Some(timeout_secs);
        self
    }

    /// Per-job timeout as a `Duration`.
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}
