//! procq-core
//!
//! Core building blocks of the procq asynchronous process tracker: a bounded
//! FIFO task queue over a persisted store, a six-state status machine, and
//! the background sweeps that keep the store healthy.
//!
//! # Modules
//! - **domain**: identifiers, task and task-type records, the status state
//!   machine
//! - **store**: the `TaskStore` port and the in-memory implementation
//! - **tracker**: the public facade and per-task `TaskStatus` handles
//! - **runtime**: async-handler registry and dispatch (worker side; the
//!   tracker never invokes handlers itself)
//! - **worker**: polling worker group
//! - **sweeper**: zombie reaper + retirement sweep loops
//! - **clock**: injectable time source
//! - **config / error / observability**: ambient plumbing

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod runtime;
pub mod store;
pub mod sweeper;
pub mod tracker;
pub mod worker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::TrackerConfig;
pub use domain::{ServerId, TaskKey, TaskRecord, TaskRef, TaskState, TaskTypeRecord};
pub use error::TrackerError;
pub use observability::QueueCounts;
pub use runtime::{DispatchError, HandlerRegistry, Runtime, TaskHandler};
pub use store::{DequeuedTask, InMemoryStore, TaskStore};
pub use sweeper::SweeperGroup;
pub use tracker::{TaskStatus, Tracker};
pub use worker::WorkerGroup;
