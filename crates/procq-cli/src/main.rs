use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use procq_core::{
    HandlerRegistry, Runtime, SweeperGroup, TaskHandler, TaskRecord, Tracker, TrackerConfig,
    WorkerGroup,
};

const PROCESS_CLASS: &str = "eo.preprocess.resample";
const ASYNC_HANDLER: &str = "handlers.resample";

#[derive(Debug, Deserialize)]
struct ResamplePayload {
    scene: String,
}

/// Demo handler: pretends to resample a scene, failing on unusable input.
struct ResampleHandler;

#[async_trait]
impl TaskHandler for ResampleHandler {
    async fn handle(&self, task: &TaskRecord) -> Result<String, String> {
        let payload: ResamplePayload =
            serde_json::from_value(task.inputs.clone()).map_err(|e| format!("json decode: {e}"))?;

        if payload.scene.ends_with("-bad") {
            return Err(format!("no usable georeference for {}", payload.scene));
        }
        Ok(format!("resampled {} ({})", payload.scene, task.parameters))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) Tracker with a fast poll so the demo finishes quickly.
    let config = TrackerConfig {
        worker_poll_ms: 50,
        zombie_sweep_ms: 5_000,
        retirement_sweep_ms: 30_000,
        ..TrackerConfig::default()
    };
    let tracker = Arc::new(Tracker::in_memory(config));

    tracker
        .register_task_type(
            PROCESS_CLASS,
            ASYNC_HANDLER,
            Duration::from_secs(30),
            Duration::from_secs(300),
        )
        .await
        .expect("register task type");

    // (B) Handler registry + runtime, then workers and sweepers.
    let mut registry = HandlerRegistry::new();
    registry
        .register(ASYNC_HANDLER, Arc::new(ResampleHandler))
        .expect("register handler");
    let runtime = Arc::new(Runtime::new(Arc::new(registry)));

    let workers = WorkerGroup::spawn(2, tracker.clone(), runtime);
    let sweepers = SweeperGroup::spawn(tracker.clone());
    info!(workers = 2, "tracker online");

    // (C) Enqueue a few tasks; the last one is designed to fail.
    let scenes = [("5501", "scene-a"), ("5502", "scene-b"), ("5503", "scene-bad")];
    for (task_id, scene) in scenes {
        let key = tracker
            .enqueue_task(
                PROCESS_CLASS,
                task_id,
                serde_json::json!({ "scene": scene }),
                "bilinear/256",
            )
            .await
            .expect("enqueue");
        println!("enqueued {task_id} as {key}");
    }

    // (D) Poll until every task has completed one way or the other.
    loop {
        let counts = tracker.counts().await.expect("counts");
        if counts.terminal() == scenes.len() {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    for (task_id, _) in scenes {
        let response = tracker
            .get_task_response(PROCESS_CLASS, task_id)
            .await
            .expect("response lookup");
        match response {
            Some(response) => println!("task {task_id}: {response}"),
            None => println!("task {task_id}: failed, no response"),
        }
    }
    println!(
        "final counts: {:?}",
        tracker.counts().await.expect("counts")
    );

    // (E) Graceful shutdown.
    workers.shutdown_and_join().await;
    sweepers.shutdown_and_join().await;
}
