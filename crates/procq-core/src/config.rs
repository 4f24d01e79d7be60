//! Tracker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tracker-wide settings.
///
/// There is no ambient global configuration: callers build one of these
/// (directly or by deserializing it) and pass it in at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Global queue capacity: the maximum number of QUEUED tasks across all
    /// process classes.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// How long an idle worker sleeps between dequeue attempts.
    #[serde(default = "default_worker_poll_ms")]
    pub worker_poll_ms: u64,

    /// Interval between zombie-reclamation sweeps.
    #[serde(default = "default_zombie_sweep_ms")]
    pub zombie_sweep_ms: u64,

    /// Interval between retirement sweeps.
    #[serde(default = "default_retirement_sweep_ms")]
    pub retirement_sweep_ms: u64,
}

fn default_max_queue_size() -> usize {
    64
}

fn default_worker_poll_ms() -> u64 {
    250
}

fn default_zombie_sweep_ms() -> u64 {
    30_000
}

fn default_retirement_sweep_ms() -> u64 {
    300_000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            worker_poll_ms: default_worker_poll_ms(),
            zombie_sweep_ms: default_zombie_sweep_ms(),
            retirement_sweep_ms: default_retirement_sweep_ms(),
        }
    }
}

impl TrackerConfig {
    pub fn worker_poll(&self) -> Duration {
        Duration::from_millis(self.worker_poll_ms)
    }

    pub fn zombie_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.zombie_sweep_ms)
    }

    pub fn retirement_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.retirement_sweep_ms)
    }
}
