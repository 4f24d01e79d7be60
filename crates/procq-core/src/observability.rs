use serde::{Deserialize, Serialize};

/// Per-state task counts, for status views and shutdown checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueCounts {
    pub accepted: usize,
    pub queued: usize,
    pub running: usize,
    pub paused: usize,
    pub success: usize,
    pub failed: usize,
}

impl QueueCounts {
    /// Number of tasks in a terminal state.
    pub fn terminal(&self) -> usize {
        self.success + self.failed
    }
}
