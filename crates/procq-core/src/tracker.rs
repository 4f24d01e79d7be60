//! Tracker facade: the public tracker API over an injected store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::clock::SystemClock;
use crate::config::TrackerConfig;
use crate::domain::{ServerId, TaskKey, TaskRecord, TaskRef, TaskState, TaskTypeRecord};
use crate::error::TrackerError;
use crate::observability::QueueCounts;
use crate::store::{DequeuedTask, InMemoryStore, TaskStore};

/// The tracker.
///
/// A thin facade over the store port: the store owns atomicity, the tracker
/// owns the public vocabulary and the operational logging. Components that
/// need the tracker share it behind an `Arc`.
pub struct Tracker {
    store: Arc<dyn TaskStore>,
    config: TrackerConfig,
}

impl Tracker {
    pub fn new(store: Arc<dyn TaskStore>, config: TrackerConfig) -> Self {
        Self { store, config }
    }

    /// Convenience wiring: an in-memory store on the system clock.
    pub fn in_memory(config: TrackerConfig) -> Self {
        let store = Arc::new(InMemoryStore::new(
            config.max_queue_size,
            Arc::new(SystemClock),
        ));
        Self::new(store, config)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The configured global queue capacity.
    pub fn max_queue_size(&self) -> usize {
        self.config.max_queue_size
    }

    pub async fn register_task_type(
        &self,
        process_class: &str,
        async_handler: &str,
        timeout: Duration,
        response_timeout: Duration,
    ) -> Result<(), TrackerError> {
        self.store
            .register_task_type(TaskTypeRecord::new(
                process_class,
                async_handler,
                timeout,
                response_timeout,
            ))
            .await?;
        info!(%process_class, %async_handler, "registered task type");
        Ok(())
    }

    pub async fn unregister_task_type(
        &self,
        process_class: &str,
        force: bool,
    ) -> Result<(), TrackerError> {
        self.store.unregister_task_type(process_class, force).await?;
        info!(%process_class, force, "unregistered task type");
        Ok(())
    }

    pub async fn enqueue_task(
        &self,
        process_class: &str,
        task_id: &str,
        inputs: serde_json::Value,
        parameters: &str,
    ) -> Result<TaskKey, TrackerError> {
        let key = self
            .store
            .enqueue(process_class, task_id, inputs, parameters)
            .await?;
        debug!(%process_class, %task_id, %key, "enqueued task");
        Ok(key)
    }

    pub async fn dequeue_task(&self, server_id: &ServerId) -> Result<DequeuedTask, TrackerError> {
        let dequeued = self.store.dequeue(server_id).await?;
        debug!(task = %dequeued.task_ref(), %server_id, "dequeued task");
        Ok(dequeued)
    }

    pub async fn start_task(
        &self,
        key: TaskKey,
        message: Option<&str>,
    ) -> Result<TaskRef, TrackerError> {
        self.store.start(key, message).await
    }

    pub async fn pause_task(&self, key: TaskKey, message: Option<&str>) -> Result<(), TrackerError> {
        self.store.pause(key, message).await
    }

    pub async fn reenqueue_task(&self, key: TaskKey, message: &str) -> Result<(), TrackerError> {
        self.store.reenqueue(key, message).await
    }

    pub async fn set_task_response(
        &self,
        key: TaskKey,
        response: &str,
    ) -> Result<(), TrackerError> {
        self.store.set_response(key, response).await
    }

    pub async fn get_task_response(
        &self,
        process_class: &str,
        task_id: &str,
    ) -> Result<Option<String>, TrackerError> {
        self.store.response(process_class, task_id).await
    }

    pub async fn get_task_status(
        &self,
        key: TaskKey,
    ) -> Result<(TaskState, Option<String>), TrackerError> {
        self.store.status(key).await
    }

    /// Full record snapshot, for handler execution and inspection.
    pub async fn get_task(&self, key: TaskKey) -> Result<TaskRecord, TrackerError> {
        self.store.task(key).await
    }

    /// Administrative delete by logical `task_id`; idempotent.
    pub async fn delete_task(&self, task_id: &str) -> Result<usize, TrackerError> {
        let removed = self.store.delete_task(task_id).await?;
        debug!(%task_id, removed, "deleted tasks");
        Ok(removed)
    }

    /// Requeue every claimed task that outlived its type's timeout.
    pub async fn reenqueue_zombie_tasks(
        &self,
        message: &str,
    ) -> Result<Vec<TaskRef>, TrackerError> {
        let reclaimed = self.store.reap_zombies(message).await?;
        if !reclaimed.is_empty() {
            info!(count = reclaimed.len(), "reclaimed zombie tasks");
        }
        Ok(reclaimed)
    }

    /// Delete completed tasks whose retention window has passed.
    pub async fn delete_retired_tasks(&self) -> Result<usize, TrackerError> {
        let removed = self.store.delete_retired().await?;
        if removed > 0 {
            info!(removed, "retired completed tasks");
        }
        Ok(removed)
    }

    pub async fn counts(&self) -> Result<QueueCounts, TrackerError> {
        self.store.counts_by_state().await
    }

    /// Handle bound to one task, for callers that only report completion.
    pub fn task_status(&self, key: TaskKey) -> TaskStatus {
        TaskStatus {
            key,
            store: Arc::clone(&self.store),
        }
    }
}

/// A handle bound to one task's key.
///
/// Held by whoever owns the task's execution; once the task is deleted (for
/// example by the retirement sweep) every call fails with `TaskNotFound`.
pub struct TaskStatus {
    key: TaskKey,
    store: Arc<dyn TaskStore>,
}

impl TaskStatus {
    pub fn key(&self) -> TaskKey {
        self.key
    }

    pub async fn get_status(&self) -> Result<(TaskState, Option<String>), TrackerError> {
        self.store.status(self.key).await
    }

    pub async fn set_success(&self, message: &str) -> Result<(), TrackerError> {
        self.store.set_success(self.key, message).await
    }

    pub async fn set_failure(&self, message: &str) -> Result<(), TrackerError> {
        self.store.set_failure(self.key, message).await
    }
}
