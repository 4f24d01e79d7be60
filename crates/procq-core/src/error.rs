use thiserror::Error;

use crate::domain::TaskState;

/// Tracker operation failures.
///
/// Every variant is an expected, caller-recoverable outcome. `QueueEmpty` in
/// particular is the normal result of polling an idle queue and must stay
/// distinguishable from real faults.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("task type not registered: {0}")]
    TaskTypeNotFound(String),

    #[error("task type already registered: {0}")]
    DuplicateTaskType(String),

    #[error("task type {0} still has task instances")]
    TaskTypeHasInstances(String),

    #[error("duplicate task {task_id} for process class {process_class}")]
    DuplicateTask {
        process_class: String,
        task_id: String,
    },

    #[error("queue is full (capacity {0})")]
    QueueFull(usize),

    #[error("queue is empty")]
    QueueEmpty,

    #[error("{operation} is not allowed from state {from:?}")]
    InvalidStateTransition {
        from: TaskState,
        operation: &'static str,
    },

    #[error("task not found: {0}")]
    TaskNotFound(String),
}
