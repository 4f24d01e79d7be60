//! Task status state machine.

use serde::{Deserialize, Serialize};

/// Task status.
///
/// Transitions:
/// - (enqueue) -> Queued
/// - Queued -> Accepted (dequeue, binds a server)
/// - Accepted -> Running (start, records the start time)
/// - Accepted | Running -> Paused
/// - Accepted | Running | Paused -> Queued (reenqueue / zombie reclaim)
/// - Accepted | Running | Paused -> Success | Failed (completion report)
///
/// The numeric codes are part of the reporting contract: status queries hand
/// them to clients as plain numbers, so they are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Dequeued by a server, not yet started.
    Accepted,

    /// Waiting in the queue.
    Queued,

    /// Handler execution in progress.
    Running,

    /// Suspended by the owning server.
    Paused,

    /// Completed, response available.
    Success,

    /// Completed with a failure message.
    Failed,
}

impl TaskState {
    /// Numeric status code reported to clients.
    pub fn code(self) -> u8 {
        match self {
            TaskState::Accepted => 1,
            TaskState::Queued => 2,
            TaskState::Running => 3,
            TaskState::Paused => 4,
            TaskState::Success => 5,
            TaskState::Failed => 6,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failed)
    }

    /// A claimed task is owned by a server: it may pause, complete, or be
    /// reclaimed by the zombie reaper.
    pub fn is_claimed(self) -> bool {
        matches!(
            self,
            TaskState::Accepted | TaskState::Running | TaskState::Paused
        )
    }
}
