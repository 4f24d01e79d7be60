//! Handler runtime: resolves async-handler identifiers to executable
//! handlers.
//!
//! The tracker records a type's `async_handler` string and hands it out on
//! dequeue; it never calls into this module. Workers do.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::TaskRecord;

/// A handler behind one async-handler identifier.
///
/// Takes the whole `TaskRecord` so the handler can decode `inputs` and
/// `parameters` as it likes. Returns the response payload to store on
/// success, or a failure message.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &TaskRecord) -> Result<String, String>;
}

/// Dispatch failures, distinct from the tracker contract: an unresolvable or
/// misbehaving handler is a worker-side concern.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler not found: {0}")]
    HandlerNotFound(String),

    #[error("duplicate handler registration: {0}")]
    DuplicateHandler(String),

    /// Failure reported by the handler itself.
    #[error("{0}")]
    Handler(String),
}

/// Registry of handlers (async-handler id -> handler).
///
/// Design:
/// - Built during initialization (mutable).
/// - Used during runtime (immutable).
/// This avoids locks and keeps lookups cheap.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under an async-handler identifier.
    pub fn register(
        &mut self,
        async_handler: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), DispatchError> {
        let async_handler = async_handler.into();
        if self.handlers.contains_key(&async_handler) {
            return Err(DispatchError::DuplicateHandler(async_handler));
        }
        self.handlers.insert(async_handler, handler);
        Ok(())
    }

    pub fn get(&self, async_handler: &str) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(async_handler)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Runtime executes one task by dispatching to the registered handler.
pub struct Runtime {
    registry: Arc<HandlerRegistry>,
}

impl Runtime {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute one task. Returns the response payload to store.
    pub async fn execute(
        &self,
        async_handler: &str,
        task: &TaskRecord,
    ) -> Result<String, DispatchError> {
        let handler = self
            .registry
            .get(async_handler)
            .ok_or_else(|| DispatchError::HandlerNotFound(async_handler.to_string()))?;

        handler.handle(task).await.map_err(DispatchError::Handler)
    }
}
