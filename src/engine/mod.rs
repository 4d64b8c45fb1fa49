// src/engine/mod.rs

//! Orchestration engine for devdag.
//!
//! This module ties together:
//! - the DAG scheduler
//! - task discovery, run in the background per request
//! - the main runtime event loop that reacts to:
//!   - requests from [`TaskGraph`] handles
//!   - discovery results
//!   - task completion events
//!   - shutdown requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`], and callers talk to it through [`handle`].

use crate::dag::DiscoveredTask;
use crate::errors::{Result, TaskError};
use crate::tasks::{TaskKey, TaskOutput};

/// Options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    /// Maximum number of tasks processed at the same time.
    pub concurrency: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Events fed into the pure core.
#[derive(Debug)]
pub enum CoreEvent {
    /// A request started discovering its tasks.
    DiscoveryStarted,
    /// A discovery finished; its tasks come dependencies-first.
    TasksDiscovered(Vec<DiscoveredTask>),
    /// A discovery failed (e.g. a cycle) and contributes nothing.
    DiscoveryFailed,
    /// A task finished processing.
    TaskCompleted {
        key: TaskKey,
        run_id: u64,
        outcome: std::result::Result<TaskOutput, TaskError>,
    },
    /// Stop everything and report what we have.
    ShutdownRequested,
}

/// Events flowing into the async runtime from background work.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// Discovery for a request finished.
    Discovered {
        request: PendingRequest,
        outcome: Result<Vec<DiscoveredTask>>,
    },
    /// A task finished processing.
    TaskCompleted {
        key: TaskKey,
        run_id: u64,
        outcome: std::result::Result<TaskOutput, TaskError>,
    },
}

pub mod core;
pub mod event_handlers;
pub mod handle;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use handle::{GraphRequest, PendingRequest, TaskGraph, TaskHandle};
pub use runtime::Runtime;
