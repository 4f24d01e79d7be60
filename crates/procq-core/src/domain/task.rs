//! Task record: the persisted unit of queued work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ServerId, TaskKey, TaskRef, TaskState};
use crate::error::TrackerError;

/// One unit of queued work.
///
/// Design:
/// - This is the single source of truth for a task's state; queue structures
///   hold `TaskKey` only.
/// - Every state change is a validating method here, so no caller can jump
///   states arbitrarily.
/// - `updated_at` moves on every transition; the zombie reaper times claimed
///   tasks from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub key: TaskKey,
    pub process_class: String,
    pub task_id: String,

    /// Opaque handler input, decoded by the handler itself.
    pub inputs: serde_json::Value,

    /// Opaque parameter string passed through to the handler.
    pub parameters: String,

    pub state: TaskState,
    pub status_message: Option<String>,

    /// Result payload, set on successful completion.
    pub response: Option<String>,

    /// The server that claimed this task (set on dequeue, cleared on
    /// reenqueue).
    pub server_id: Option<ServerId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(
        key: TaskKey,
        process_class: impl Into<String>,
        task_id: impl Into<String>,
        inputs: serde_json::Value,
        parameters: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            process_class: process_class.into(),
            task_id: task_id.into(),
            inputs,
            parameters: parameters.into(),
            state: TaskState::Queued,
            status_message: None,
            response: None,
            server_id: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn task_ref(&self) -> TaskRef {
        TaskRef::new(self.process_class.clone(), self.task_id.clone())
    }

    fn deny(&self, operation: &'static str) -> TrackerError {
        TrackerError::InvalidStateTransition {
            from: self.state,
            operation,
        }
    }

    /// Queued -> Accepted. Binds the claiming server.
    pub fn accept(&mut self, server_id: ServerId, now: DateTime<Utc>) -> Result<(), TrackerError> {
        if self.state != TaskState::Queued {
            return Err(self.deny("dequeue"));
        }
        self.state = TaskState::Accepted;
        self.server_id = Some(server_id);
        self.updated_at = now;
        Ok(())
    }

    /// Accepted -> Running. Records the start time.
    pub fn start(&mut self, message: Option<String>, now: DateTime<Utc>) -> Result<(), TrackerError> {
        if self.state != TaskState::Accepted {
            return Err(self.deny("start"));
        }
        self.state = TaskState::Running;
        self.started_at = Some(now);
        if message.is_some() {
            self.status_message = message;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Accepted | Running -> Paused.
    pub fn pause(&mut self, message: Option<String>, now: DateTime<Utc>) -> Result<(), TrackerError> {
        if !matches!(self.state, TaskState::Accepted | TaskState::Running) {
            return Err(self.deny("pause"));
        }
        self.state = TaskState::Paused;
        if message.is_some() {
            self.status_message = message;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Accepted | Running | Paused -> Queued. Clears the owning server so the
    /// task can be claimed again.
    pub fn requeue(&mut self, message: String, now: DateTime<Utc>) -> Result<(), TrackerError> {
        if !self.state.is_claimed() {
            return Err(self.deny("reenqueue"));
        }
        self.state = TaskState::Queued;
        self.server_id = None;
        self.started_at = None;
        self.status_message = Some(message);
        self.updated_at = now;
        Ok(())
    }

    /// Accepted | Running | Paused -> Success. Stores the response payload
    /// and/or the status message when given.
    pub fn complete_success(
        &mut self,
        message: Option<String>,
        response: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        if !self.state.is_claimed() {
            return Err(self.deny("set_success"));
        }
        self.state = TaskState::Success;
        if message.is_some() {
            self.status_message = message;
        }
        if response.is_some() {
            self.response = response;
        }
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Accepted | Running | Paused -> Failed.
    pub fn complete_failure(
        &mut self,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        if !self.state.is_claimed() {
            return Err(self.deny("set_failure"));
        }
        self.state = TaskState::Failed;
        self.status_message = Some(message);
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
