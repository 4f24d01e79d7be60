//! Sweeper group: periodic zombie reclamation and retirement.
//!
//! Two background loops with the same shutdown discipline as the worker
//! group. Each sweep is one store operation; failures are logged and the loop
//! keeps going, so one bad pass never kills the sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::tracker::Tracker;

const ZOMBIE_MESSAGE: &str = "requeued by zombie reaper";

/// Sweeper group handle.
pub struct SweeperGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl SweeperGroup {
    /// Spawn the zombie-reaper and retirement loops on the intervals from the
    /// tracker's config.
    pub fn spawn(tracker: Arc<Tracker>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let zombie_interval = tracker.config().zombie_sweep_interval();
        let retirement_interval = tracker.config().retirement_sweep_interval();

        let zombie = {
            let tracker = Arc::clone(&tracker);
            let mut rx = shutdown_rx.clone();
            tokio::spawn(async move {
                zombie_loop(tracker, zombie_interval, &mut rx).await;
            })
        };
        let retirement = {
            let mut rx = shutdown_rx.clone();
            tokio::spawn(async move {
                retirement_loop(tracker, retirement_interval, &mut rx).await;
            })
        };

        Self {
            shutdown_tx,
            joins: vec![zombie, retirement],
        }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

/// Sleep one interval, waking early on shutdown. Returns `false` when the
/// loop should exit.
async fn tick(interval: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown_rx.changed() => {}
        _ = tokio::time::sleep(interval) => {}
    }
    !*shutdown_rx.borrow()
}

async fn zombie_loop(
    tracker: Arc<Tracker>,
    interval: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    while tick(interval, shutdown_rx).await {
        if let Err(err) = tracker.reenqueue_zombie_tasks(ZOMBIE_MESSAGE).await {
            warn!(%err, "zombie sweep failed");
        }
    }
}

async fn retirement_loop(
    tracker: Arc<Tracker>,
    interval: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    while tick(interval, shutdown_rx).await {
        if let Err(err) = tracker.delete_retired_tasks().await {
            warn!(%err, "retirement sweep failed");
        }
    }
}
