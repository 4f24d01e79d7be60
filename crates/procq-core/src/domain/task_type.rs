//! Registered process classes and their timeout policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A registered category of task.
///
/// `async_handler` is an opaque identifier: the tracker records it and hands
/// it to whoever dequeues the task, but never resolves or invokes it itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTypeRecord {
    /// Unique type key, e.g. "eo.preprocess.resample".
    pub process_class: String,

    /// Handler identifier, resolved by the worker-side runtime registry.
    pub async_handler: String,

    /// How long a claimed task may go without a status change before the
    /// zombie reaper reclaims it.
    pub timeout: Duration,

    /// How long a completed task's response is retained before the
    /// retirement sweep may delete it.
    pub response_timeout: Duration,
}

impl TaskTypeRecord {
    pub fn new(
        process_class: impl Into<String>,
        async_handler: impl Into<String>,
        timeout: Duration,
        response_timeout: Duration,
    ) -> Self {
        Self {
            process_class: process_class.into(),
            async_handler: async_handler.into(),
            timeout,
            response_timeout,
        }
    }
}
