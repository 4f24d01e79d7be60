//! Worker group: polls the tracker and executes dequeued tasks.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::ServerId;
use crate::error::TrackerError;
use crate::runtime::Runtime;
use crate::tracker::Tracker;

/// Worker group handle.
/// - `request_shutdown()` stops every worker after its current task
/// - `shutdown_and_join()` additionally waits for them to exit
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, tracker: Arc<Tracker>, runtime: Arc<Runtime>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let t = Arc::clone(&tracker);
            let rt = Arc::clone(&runtime);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, t, rt, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    /// Request shutdown for all workers. Does not cancel an in-flight handler
    /// execution; workers just stop taking new tasks.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    tracker: Arc<Tracker>,
    runtime: Arc<Runtime>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let server_id = ServerId::new(format!("worker-{worker_id}"));
    let poll = tracker.config().worker_poll();

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let dequeued = match tracker.dequeue_task(&server_id).await {
            Ok(dequeued) => dequeued,
            Err(TrackerError::QueueEmpty) => {
                // Idle: sleep one poll interval, waking early on shutdown.
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(poll) => {}
                }
                continue;
            }
            Err(err) => {
                warn!(worker_id, %err, "dequeue failed");
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(poll) => {}
                }
                continue;
            }
        };

        // Claim: ACCEPTED -> RUNNING. If another actor got in first (reaper,
        // administrative delete), drop the task and move on.
        let task_ref = match tracker.start_task(dequeued.key, None).await {
            Ok(task_ref) => task_ref,
            Err(err) => {
                warn!(worker_id, task = %dequeued.task_ref(), %err, "could not start task");
                continue;
            }
        };

        let task = match tracker.get_task(dequeued.key).await {
            Ok(task) => task,
            Err(err) => {
                warn!(worker_id, task = %task_ref, %err, "task vanished before execution");
                continue;
            }
        };

        debug!(worker_id, task = %task_ref, handler = %dequeued.async_handler, "executing");
        let status = tracker.task_status(dequeued.key);
        match runtime.execute(&dequeued.async_handler, &task).await {
            Ok(response) => {
                if let Err(err) = tracker.set_task_response(dequeued.key, &response).await {
                    warn!(worker_id, task = %task_ref, %err, "could not store response");
                }
            }
            Err(err) => {
                if let Err(report_err) = status.set_failure(&err.to_string()).await {
                    warn!(worker_id, task = %task_ref, %report_err, "could not report failure");
                }
            }
        }
    }
}
