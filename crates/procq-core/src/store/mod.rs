//! Task store port and the in-memory implementation.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;

use crate::domain::{ServerId, TaskKey, TaskRecord, TaskRef, TaskState, TaskTypeRecord};
use crate::error::TrackerError;
use crate::observability::QueueCounts;

/// Result of a successful dequeue: everything a worker needs to run the task
/// it just claimed.
#[derive(Debug, Clone)]
pub struct DequeuedTask {
    pub key: TaskKey,
    pub process_class: String,
    pub task_id: String,

    /// Handler identifier from the task's type, for the runtime registry.
    pub async_handler: String,
}

impl DequeuedTask {
    pub fn task_ref(&self) -> TaskRef {
        TaskRef::new(self.process_class.clone(), self.task_id.clone())
    }
}

/// Store port (interface).
///
/// The single source of truth for task types and tasks. Independent worker
/// processes coordinate only through this port, so every method is one atomic
/// operation: implementations must make check-and-insert (enqueue),
/// select-and-transition (dequeue), check-and-delete (unregister) and
/// detect-and-conditionally-requeue (reap) indivisible. Concurrent `dequeue`
/// callers each get a distinct task or `QueueEmpty`; no task is handed out
/// twice.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Register a process class. Fails with `DuplicateTaskType` if the class
    /// already exists.
    async fn register_task_type(&self, record: TaskTypeRecord) -> Result<(), TrackerError>;

    /// Unregister a process class. Without `force`, fails with
    /// `TaskTypeHasInstances` while any task references the class; with
    /// `force`, the class and all its tasks are removed.
    async fn unregister_task_type(
        &self,
        process_class: &str,
        force: bool,
    ) -> Result<(), TrackerError>;

    /// Atomically check type existence, logical-id uniqueness and queue
    /// capacity, then insert a new QUEUED task.
    async fn enqueue(
        &self,
        process_class: &str,
        task_id: &str,
        inputs: serde_json::Value,
        parameters: &str,
    ) -> Result<TaskKey, TrackerError>;

    /// Atomically pop the oldest QUEUED task and transition it to ACCEPTED,
    /// bound to `server_id`. Fails with `QueueEmpty` immediately if nothing
    /// is queued; never blocks.
    async fn dequeue(&self, server_id: &ServerId) -> Result<DequeuedTask, TrackerError>;

    /// ACCEPTED -> RUNNING. Returns the task's logical identity.
    async fn start(&self, key: TaskKey, message: Option<&str>) -> Result<TaskRef, TrackerError>;

    /// ACCEPTED | RUNNING -> PAUSED.
    async fn pause(&self, key: TaskKey, message: Option<&str>) -> Result<(), TrackerError>;

    /// Claimed -> QUEUED, at the back of the queue. Not subject to the
    /// capacity bound: recovery must not fail because the queue is full.
    async fn reenqueue(&self, key: TaskKey, message: &str) -> Result<(), TrackerError>;

    /// Claimed -> SUCCESS, storing the response payload.
    async fn set_response(&self, key: TaskKey, response: &str) -> Result<(), TrackerError>;

    /// Claimed -> SUCCESS, storing a status message.
    async fn set_success(&self, key: TaskKey, message: &str) -> Result<(), TrackerError>;

    /// Claimed -> FAILED, storing the failure message.
    async fn set_failure(&self, key: TaskKey, message: &str) -> Result<(), TrackerError>;

    /// Current status and message. `TaskNotFound` once the task is deleted.
    async fn status(&self, key: TaskKey) -> Result<(TaskState, Option<String>), TrackerError>;

    /// Full record snapshot (workers need the inputs and parameters).
    async fn task(&self, key: TaskKey) -> Result<TaskRecord, TrackerError>;

    /// Response payload by logical identity. `Ok(None)` when the task exists
    /// but has not stored a response yet.
    async fn response(
        &self,
        process_class: &str,
        task_id: &str,
    ) -> Result<Option<String>, TrackerError>;

    /// Administrative delete by logical `task_id`, any state, any class.
    /// Idempotent; returns the number of tasks removed.
    async fn delete_task(&self, task_id: &str) -> Result<usize, TrackerError>;

    /// Requeue every claimed task whose time since its last status change
    /// exceeds its type's `timeout`. The state is re-checked under the store
    /// lock before each update, so a concurrent completion wins. Returns the
    /// reclaimed tasks.
    async fn reap_zombies(&self, message: &str) -> Result<Vec<TaskRef>, TrackerError>;

    /// Delete every terminal task whose `completed_at` has passed its type's
    /// `response_timeout`. Returns the number removed. One bad record is
    /// logged and skipped, never aborts the sweep.
    async fn delete_retired(&self) -> Result<usize, TrackerError>;

    /// Per-state counts for status views.
    async fn counts_by_state(&self) -> Result<QueueCounts, TrackerError>;
}
