//! In-memory store implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::clock::Clock;
use crate::domain::{ServerId, TaskKey, TaskRecord, TaskRef, TaskState, TaskTypeRecord};
use crate::error::TrackerError;
use crate::observability::QueueCounts;
use crate::store::{DequeuedTask, TaskStore};

/// In-memory store state.
struct StoreState {
    /// Registered process classes.
    types: HashMap<String, TaskTypeRecord>,

    /// All task records (single source of truth for tasks).
    tasks: HashMap<TaskKey, TaskRecord>,

    /// Logical identity index: (process_class, task_id) -> key.
    by_ref: HashMap<(String, String), TaskKey>,

    /// QUEUED keys in FIFO order.
    ready: VecDeque<TaskKey>,
}

impl StoreState {
    fn new() -> Self {
        Self {
            types: HashMap::new(),
            tasks: HashMap::new(),
            by_ref: HashMap::new(),
            ready: VecDeque::new(),
        }
    }

    fn task(&self, key: TaskKey) -> Result<&TaskRecord, TrackerError> {
        self.tasks
            .get(&key)
            .ok_or_else(|| TrackerError::TaskNotFound(key.to_string()))
    }

    fn task_mut(&mut self, key: TaskKey) -> Result<&mut TaskRecord, TrackerError> {
        self.tasks
            .get_mut(&key)
            .ok_or_else(|| TrackerError::TaskNotFound(key.to_string()))
    }

    /// Remove a task from the record map, the identity index and the ready
    /// queue.
    fn remove_task(&mut self, key: TaskKey) {
        if let Some(task) = self.tasks.remove(&key) {
            self.by_ref.remove(&(task.process_class, task.task_id));
        }
        self.ready.retain(|k| *k != key);
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for task in self.tasks.values() {
            match task.state {
                TaskState::Accepted => counts.accepted += 1,
                TaskState::Queued => counts.queued += 1,
                TaskState::Running => counts.running += 1,
                TaskState::Paused => counts.paused += 1,
                TaskState::Success => counts.success += 1,
                TaskState::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// `true` once `timeout` has fully elapsed since `since`.
fn timed_out(now: DateTime<Utc>, since: DateTime<Utc>, timeout: Duration) -> bool {
    now.signed_duration_since(since)
        .to_std()
        .map(|elapsed| elapsed > timeout)
        .unwrap_or(false)
}

/// In-memory `TaskStore`.
///
/// Every operation takes the single state mutex once and releases it before
/// returning, so each trait method is indivisible (the single-writer
/// discipline the port requires). The capacity bound and the clock live here
/// because enqueue admission and zombie/retirement timing are store concerns.
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
    max_queue_size: usize,
}

impl InMemoryStore {
    pub fn new(max_queue_size: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::new()),
            clock,
            max_queue_size,
        }
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn register_task_type(&self, record: TaskTypeRecord) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        if state.types.contains_key(&record.process_class) {
            return Err(TrackerError::DuplicateTaskType(record.process_class));
        }
        state.types.insert(record.process_class.clone(), record);
        Ok(())
    }

    async fn unregister_task_type(
        &self,
        process_class: &str,
        force: bool,
    ) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        if !state.types.contains_key(process_class) {
            return Err(TrackerError::TaskTypeNotFound(process_class.to_string()));
        }

        let instances: Vec<TaskKey> = state
            .tasks
            .values()
            .filter(|t| t.process_class == process_class)
            .map(|t| t.key)
            .collect();
        if !instances.is_empty() && !force {
            return Err(TrackerError::TaskTypeHasInstances(process_class.to_string()));
        }

        // Forced removal cascades to the type's tasks, whatever their state.
        for key in instances {
            state.remove_task(key);
        }
        state.types.remove(process_class);
        Ok(())
    }

    async fn enqueue(
        &self,
        process_class: &str,
        task_id: &str,
        inputs: serde_json::Value,
        parameters: &str,
    ) -> Result<TaskKey, TrackerError> {
        let mut state = self.state.lock().await;
        if !state.types.contains_key(process_class) {
            return Err(TrackerError::TaskTypeNotFound(process_class.to_string()));
        }

        let ref_key = (process_class.to_string(), task_id.to_string());
        if state.by_ref.contains_key(&ref_key) {
            return Err(TrackerError::DuplicateTask {
                process_class: process_class.to_string(),
                task_id: task_id.to_string(),
            });
        }

        // The capacity bound counts QUEUED tasks across all classes.
        if state.ready.len() >= self.max_queue_size {
            return Err(TrackerError::QueueFull(self.max_queue_size));
        }

        let key = TaskKey::generate();
        let record = TaskRecord::new(
            key,
            process_class,
            task_id,
            inputs,
            parameters,
            self.clock.now(),
        );
        state.tasks.insert(key, record);
        state.by_ref.insert(ref_key, key);
        state.ready.push_back(key);
        Ok(key)
    }

    async fn dequeue(&self, server_id: &ServerId) -> Result<DequeuedTask, TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        while let Some(key) = state.ready.pop_front() {
            let Some(task) = state.tasks.get_mut(&key) else {
                warn!(%key, "ready queue referenced a missing task, skipping");
                continue;
            };
            if let Err(err) = task.accept(server_id.clone(), now) {
                warn!(%key, %err, "ready queue entry was not claimable, skipping");
                continue;
            }
            let process_class = task.process_class.clone();
            let task_id = task.task_id.clone();

            let async_handler = match state.types.get(&process_class) {
                Some(ty) => ty.async_handler.clone(),
                None => {
                    warn!(%process_class, "dequeued task references an unregistered type");
                    String::new()
                }
            };
            return Ok(DequeuedTask {
                key,
                process_class,
                task_id,
                async_handler,
            });
        }

        Err(TrackerError::QueueEmpty)
    }

    async fn start(&self, key: TaskKey, message: Option<&str>) -> Result<TaskRef, TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let task = state.task_mut(key)?;
        task.start(message.map(str::to_string), now)?;
        Ok(task.task_ref())
    }

    async fn pause(&self, key: TaskKey, message: Option<&str>) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state.task_mut(key)?.pause(message.map(str::to_string), now)
    }

    async fn reenqueue(&self, key: TaskKey, message: &str) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state.task_mut(key)?.requeue(message.to_string(), now)?;
        state.ready.push_back(key);
        Ok(())
    }

    async fn set_response(&self, key: TaskKey, response: &str) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state
            .task_mut(key)?
            .complete_success(None, Some(response.to_string()), now)
    }

    async fn set_success(&self, key: TaskKey, message: &str) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state
            .task_mut(key)?
            .complete_success(Some(message.to_string()), None, now)
    }

    async fn set_failure(&self, key: TaskKey, message: &str) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state.task_mut(key)?.complete_failure(message.to_string(), now)
    }

    async fn status(&self, key: TaskKey) -> Result<(TaskState, Option<String>), TrackerError> {
        let state = self.state.lock().await;
        let task = state.task(key)?;
        Ok((task.state, task.status_message.clone()))
    }

    async fn task(&self, key: TaskKey) -> Result<TaskRecord, TrackerError> {
        let state = self.state.lock().await;
        Ok(state.task(key)?.clone())
    }

    async fn response(
        &self,
        process_class: &str,
        task_id: &str,
    ) -> Result<Option<String>, TrackerError> {
        let state = self.state.lock().await;
        let ref_key = (process_class.to_string(), task_id.to_string());
        let key = state
            .by_ref
            .get(&ref_key)
            .ok_or_else(|| TrackerError::TaskNotFound(format!("{process_class}/{task_id}")))?;
        Ok(state.task(*key)?.response.clone())
    }

    async fn delete_task(&self, task_id: &str) -> Result<usize, TrackerError> {
        let mut state = self.state.lock().await;
        let matches: Vec<TaskKey> = state
            .tasks
            .values()
            .filter(|t| t.task_id == task_id)
            .map(|t| t.key)
            .collect();
        let removed = matches.len();
        for key in matches {
            state.remove_task(key);
        }
        Ok(removed)
    }

    async fn reap_zombies(&self, message: &str) -> Result<Vec<TaskRef>, TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let candidates: Vec<TaskKey> = state
            .tasks
            .values()
            .filter(|t| t.state.is_claimed())
            .map(|t| t.key)
            .collect();

        let mut reclaimed = Vec::new();
        for key in candidates {
            let (expired, task_ref) = {
                let Some(task) = state.tasks.get(&key) else {
                    continue;
                };
                // Re-check: the task may have completed since the scan.
                if !task.state.is_claimed() {
                    continue;
                }
                let Some(ty) = state.types.get(&task.process_class) else {
                    warn!(task = %task.task_ref(), "task references an unregistered type, skipping");
                    continue;
                };
                (timed_out(now, task.updated_at, ty.timeout), task.task_ref())
            };
            if !expired {
                continue;
            }

            let mut requeued = false;
            if let Some(task) = state.tasks.get_mut(&key) {
                match task.requeue(message.to_string(), now) {
                    Ok(()) => requeued = true,
                    Err(err) => warn!(task = %task_ref, %err, "zombie requeue rejected, skipping"),
                }
            }
            if requeued {
                state.ready.push_back(key);
                reclaimed.push(task_ref);
            }
        }

        Ok(reclaimed)
    }

    async fn delete_retired(&self) -> Result<usize, TrackerError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let candidates: Vec<TaskKey> = state
            .tasks
            .values()
            .filter(|t| t.state.is_terminal())
            .map(|t| t.key)
            .collect();

        let mut removed = 0;
        for key in candidates {
            let retire = {
                let Some(task) = state.tasks.get(&key) else {
                    continue;
                };
                let Some(completed_at) = task.completed_at else {
                    warn!(task = %task.task_ref(), "terminal task has no completion time, skipping");
                    continue;
                };
                let Some(ty) = state.types.get(&task.process_class) else {
                    warn!(task = %task.task_ref(), "task references an unregistered type, skipping");
                    continue;
                };
                timed_out(now, completed_at, ty.response_timeout)
            };
            if retire {
                state.remove_task(key);
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn counts_by_state(&self) -> Result<QueueCounts, TrackerError> {
        let state = self.state.lock().await;
        Ok(state.counts())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::FixedClock;

    const CLASS: &str = "TEST-PROCESS";
    const FAST_CLASS: &str = "FAST-PROCESS";
    const HANDLER: &str = "handlers.test";

    fn store_with_capacity(capacity: usize) -> (InMemoryStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        (InMemoryStore::new(capacity, clock.clone()), clock)
    }

    async fn register(store: &InMemoryStore, process_class: &str, timeout_secs: u64) {
        store
            .register_task_type(TaskTypeRecord::new(
                process_class,
                HANDLER,
                Duration::from_secs(timeout_secs),
                Duration::from_secs(timeout_secs),
            ))
            .await
            .unwrap();
    }

    fn inputs() -> serde_json::Value {
        serde_json::json!({ "key": "value" })
    }

    fn server() -> ServerId {
        ServerId::new("server-1")
    }

    #[tokio::test]
    async fn duplicate_type_registration_is_rejected() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;

        let err = store
            .register_task_type(TaskTypeRecord::new(
                CLASS,
                HANDLER,
                Duration::from_secs(60),
                Duration::from_secs(60),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateTaskType(class) if class == CLASS));
    }

    #[tokio::test]
    async fn unregister_is_blocked_by_live_instances() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        store.enqueue(CLASS, "1111111", inputs(), "").await.unwrap();

        let err = store.unregister_task_type(CLASS, false).await.unwrap_err();
        assert!(matches!(err, TrackerError::TaskTypeHasInstances(class) if class == CLASS));

        // Draining the instance makes the unregister legal.
        assert_eq!(store.delete_task("1111111").await.unwrap(), 1);
        store.unregister_task_type(CLASS, false).await.unwrap();
    }

    #[tokio::test]
    async fn forced_unregister_cascades_to_instances() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        let key = store.enqueue(CLASS, "2222222", inputs(), "").await.unwrap();

        store.unregister_task_type(CLASS, true).await.unwrap();

        assert!(matches!(
            store.status(key).await,
            Err(TrackerError::TaskNotFound(_))
        ));
        // The cascade already removed the task; deleting again is a no-op.
        assert_eq!(store.delete_task("2222222").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unregister_of_unknown_type_fails() {
        let (store, _clock) = store_with_capacity(8);
        let err = store
            .unregister_task_type("TEST-PROCESS-NOT-REGISTERED", true)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::TaskTypeNotFound(_)));
    }

    #[tokio::test]
    async fn enqueue_requires_a_registered_type() {
        let (store, _clock) = store_with_capacity(8);
        let err = store
            .enqueue("TEST-PROCESS-NOT-REGISTERED", "3333333", inputs(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::TaskTypeNotFound(_)));
    }

    #[tokio::test]
    async fn dequeue_beyond_queued_tasks_reports_empty() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        store.enqueue(CLASS, "1111111", inputs(), "").await.unwrap();
        store.enqueue(CLASS, "2222222", inputs(), "").await.unwrap();

        store.dequeue(&server()).await.unwrap();
        store.dequeue(&server()).await.unwrap();
        assert!(matches!(
            store.dequeue(&server()).await,
            Err(TrackerError::QueueEmpty)
        ));
    }

    #[tokio::test]
    async fn queue_rejects_enqueues_past_capacity() {
        let (store, _clock) = store_with_capacity(4);
        register(&store, CLASS, 60).await;

        for t in 0..4 {
            store
                .enqueue(CLASS, &t.to_string(), inputs(), "")
                .await
                .unwrap();
        }
        let err = store.enqueue(CLASS, "4", inputs(), "").await.unwrap_err();
        assert!(matches!(err, TrackerError::QueueFull(4)));

        for t in 0..4 {
            assert_eq!(store.delete_task(&t.to_string()).await.unwrap(), 1);
        }
        assert!(matches!(
            store.dequeue(&server()).await,
            Err(TrackerError::QueueEmpty)
        ));
    }

    #[tokio::test]
    async fn duplicate_task_ids_are_rejected_not_overwritten() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        store.enqueue(CLASS, "5555555", inputs(), "").await.unwrap();

        let err = store
            .enqueue(CLASS, "5555555", serde_json::json!({ "other": true }), "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TrackerError::DuplicateTask { process_class, task_id }
                if process_class == CLASS && task_id == "5555555"
        ));
    }

    #[tokio::test]
    async fn dequeue_then_start_yields_running() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        store.enqueue(CLASS, "3333333", inputs(), "").await.unwrap();

        let dequeued = store.dequeue(&server()).await.unwrap();
        assert_eq!(dequeued.async_handler, HANDLER);

        let started = store.start(dequeued.key, None).await.unwrap();
        assert_eq!(started.task_id, "3333333");

        let (state, _message) = store.status(dequeued.key).await.unwrap();
        assert_eq!(state, TaskState::Running);
        assert_eq!(state.code(), 3);
    }

    #[tokio::test]
    async fn response_round_trips_by_logical_identity() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        store.enqueue(CLASS, "4444444", inputs(), "").await.unwrap();

        assert_eq!(store.response(CLASS, "4444444").await.unwrap(), None);

        let dequeued = store.dequeue(&server()).await.unwrap();
        store.set_response(dequeued.key, "123").await.unwrap();

        assert_eq!(
            store.response(CLASS, "4444444").await.unwrap().as_deref(),
            Some("123")
        );
        let (state, _message) = store.status(dequeued.key).await.unwrap();
        assert_eq!(state, TaskState::Success);
    }

    #[tokio::test]
    async fn response_of_unknown_task_fails() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        assert!(matches!(
            store.response(CLASS, "no-such-task").await,
            Err(TrackerError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn dequeue_preserves_enqueue_order() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        for id in ["first", "second", "third"] {
            store.enqueue(CLASS, id, inputs(), "").await.unwrap();
        }

        assert_eq!(store.dequeue(&server()).await.unwrap().task_id, "first");
        assert_eq!(store.dequeue(&server()).await.unwrap().task_id, "second");
        assert_eq!(store.dequeue(&server()).await.unwrap().task_id, "third");
    }

    #[tokio::test]
    async fn reenqueued_task_goes_to_the_back() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        store.enqueue(CLASS, "a", inputs(), "").await.unwrap();
        store.enqueue(CLASS, "b", inputs(), "").await.unwrap();

        let first = store.dequeue(&server()).await.unwrap();
        assert_eq!(first.task_id, "a");
        store.reenqueue(first.key, "run again").await.unwrap();

        assert_eq!(store.dequeue(&server()).await.unwrap().task_id, "b");
        let again = store.dequeue(&server()).await.unwrap();
        assert_eq!(again.task_id, "a");

        let (_, message) = store.status(again.key).await.unwrap();
        assert_eq!(message.as_deref(), Some("run again"));
    }

    #[tokio::test]
    async fn reenqueue_is_not_bounded_by_capacity() {
        let (store, _clock) = store_with_capacity(1);
        register(&store, CLASS, 60).await;
        store.enqueue(CLASS, "a", inputs(), "").await.unwrap();

        let claimed = store.dequeue(&server()).await.unwrap();
        store.enqueue(CLASS, "b", inputs(), "").await.unwrap();

        // The queue is at capacity again, but reclaiming must still work.
        store.reenqueue(claimed.key, "recovered").await.unwrap();
        let counts = store.counts_by_state().await.unwrap();
        assert_eq!(counts.queued, 2);
    }

    #[tokio::test]
    async fn start_requires_a_claimed_task() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        let key = store.enqueue(CLASS, "a", inputs(), "").await.unwrap();

        let err = store.start(key, None).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidStateTransition {
                from: TaskState::Queued,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn queued_task_cannot_report_completion() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        let key = store.enqueue(CLASS, "a", inputs(), "").await.unwrap();

        assert!(store.set_success(key, "ok").await.is_err());
        assert!(store.set_failure(key, "bad").await.is_err());
    }

    #[tokio::test]
    async fn paused_task_can_be_failed() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        store.enqueue(CLASS, "7777777", inputs(), "").await.unwrap();

        let dequeued = store.dequeue(&server()).await.unwrap();
        store.start(dequeued.key, Some("start running")).await.unwrap();
        store.pause(dequeued.key, None).await.unwrap();
        store.set_failure(dequeued.key, "failed").await.unwrap();

        let (state, message) = store.status(dequeued.key).await.unwrap();
        assert_eq!(state.code(), 6);
        assert_eq!(message.as_deref(), Some("failed"));
    }

    #[tokio::test]
    async fn timed_out_claimed_tasks_are_reclaimed() {
        let (store, clock) = store_with_capacity(8);
        register(&store, FAST_CLASS, 2).await;
        for id in ["1111111", "2222222", "3333333"] {
            store.enqueue(FAST_CLASS, id, inputs(), "").await.unwrap();
        }

        let t1 = store.dequeue(&server()).await.unwrap();
        let t2 = store.dequeue(&server()).await.unwrap();
        let t3 = store.dequeue(&server()).await.unwrap();

        // t1 stays ACCEPTED, t2 runs, t3 pauses.
        store.start(t2.key, Some("start running second")).await.unwrap();
        store.pause(t3.key, Some("pause third")).await.unwrap();

        clock.advance(Duration::from_secs(3));
        let reclaimed = store.reap_zombies("reclaimed").await.unwrap();
        assert_eq!(reclaimed.len(), 3);

        let mut code_sum = 0u32;
        for key in [t1.key, t2.key, t3.key] {
            let (state, message) = store.status(key).await.unwrap();
            assert_eq!(state, TaskState::Queued);
            assert_eq!(message.as_deref(), Some("reclaimed"));
            code_sum += u32::from(state.code());
        }
        assert_eq!(code_sum, 6);
    }

    #[tokio::test]
    async fn reaper_respects_each_types_timeout() {
        let (store, clock) = store_with_capacity(8);
        register(&store, FAST_CLASS, 2).await;
        register(&store, CLASS, 60).await;
        store.enqueue(FAST_CLASS, "fast", inputs(), "").await.unwrap();
        store.enqueue(CLASS, "slow", inputs(), "").await.unwrap();

        let fast = store.dequeue(&server()).await.unwrap();
        let slow = store.dequeue(&server()).await.unwrap();
        store.start(fast.key, None).await.unwrap();
        store.start(slow.key, None).await.unwrap();

        clock.advance(Duration::from_secs(3));
        let reclaimed = store.reap_zombies("reclaimed").await.unwrap();

        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].task_id, "fast");
        let (state, _) = store.status(slow.key).await.unwrap();
        assert_eq!(state, TaskState::Running);
    }

    #[tokio::test]
    async fn reaper_leaves_completed_tasks_alone() {
        let (store, clock) = store_with_capacity(8);
        register(&store, FAST_CLASS, 2).await;
        store.enqueue(FAST_CLASS, "done", inputs(), "").await.unwrap();

        let dequeued = store.dequeue(&server()).await.unwrap();
        store.start(dequeued.key, None).await.unwrap();
        store.set_response(dequeued.key, "42").await.unwrap();

        clock.advance(Duration::from_secs(3));
        let reclaimed = store.reap_zombies("reclaimed").await.unwrap();

        assert!(reclaimed.is_empty());
        let (state, _) = store.status(dequeued.key).await.unwrap();
        assert_eq!(state, TaskState::Success);
    }

    #[tokio::test]
    async fn retired_tasks_are_deleted_after_the_response_timeout() {
        let (store, clock) = store_with_capacity(8);
        register(&store, FAST_CLASS, 2).await;
        store.enqueue(FAST_CLASS, "8888888", inputs(), "").await.unwrap();

        let dequeued = store.dequeue(&server()).await.unwrap();
        store.start(dequeued.key, Some("go")).await.unwrap();
        store.set_success(dequeued.key, "OK").await.unwrap();

        clock.advance(Duration::from_secs(5));
        assert_eq!(store.delete_retired().await.unwrap(), 1);

        assert!(matches!(
            store.status(dequeued.key).await,
            Err(TrackerError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn retirement_keeps_fresh_completions() {
        let (store, clock) = store_with_capacity(8);
        register(&store, FAST_CLASS, 2).await;
        store.enqueue(FAST_CLASS, "fresh", inputs(), "").await.unwrap();

        let dequeued = store.dequeue(&server()).await.unwrap();
        store.set_response(dequeued.key, "kept").await.unwrap();

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.delete_retired().await.unwrap(), 0);
        assert_eq!(
            store.response(FAST_CLASS, "fresh").await.unwrap().as_deref(),
            Some("kept")
        );
    }

    #[tokio::test]
    async fn concurrent_dequeues_never_hand_out_the_same_task() {
        let (store, _clock) = store_with_capacity(16);
        let store = Arc::new(store);
        register(&store, CLASS, 60).await;
        for i in 0..8 {
            store
                .enqueue(CLASS, &i.to_string(), inputs(), "")
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .dequeue(&ServerId::new(format!("server-{worker}")))
                    .await
                    .unwrap()
                    .key
            }));
        }

        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.unwrap());
        }
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 8);

        assert!(matches!(
            store.dequeue(&server()).await,
            Err(TrackerError::QueueEmpty)
        ));
    }

    #[tokio::test]
    async fn counts_follow_the_lifecycle() {
        let (store, _clock) = store_with_capacity(8);
        register(&store, CLASS, 60).await;
        for id in ["a", "b", "c"] {
            store.enqueue(CLASS, id, inputs(), "").await.unwrap();
        }

        let claimed = store.dequeue(&server()).await.unwrap();
        store.start(claimed.key, None).await.unwrap();

        let counts = store.counts_by_state().await.unwrap();
        assert_eq!(counts.queued, 2);
        assert_eq!(counts.running, 1);
        assert_eq!(counts.terminal(), 0);

        store.set_response(claimed.key, "done").await.unwrap();
        let counts = store.counts_by_state().await.unwrap();
        assert_eq!(counts.success, 1);
        assert_eq!(counts.terminal(), 1);
    }
}
