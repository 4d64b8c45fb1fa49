// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning task bodies
//! itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production executor in [`task_runner`](super::task_runner).
//!
//! - `RealExecutorBackend` is the default implementation. It spawns one
//!   tokio task per scheduled task, which calls `Task::process` and reports
//!   the outcome back to the runtime.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were scheduled and directly emits `TaskCompleted` events.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::tasks::TaskContext;

use super::task_runner::run_task;

/// Trait abstracting how scheduled tasks are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't touch any backend.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution.
    ///
    /// The implementation must eventually emit exactly one
    /// `RuntimeEvent::TaskCompleted` per task.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    ctx: Arc<TaskContext>,
    events_tx: mpsc::Sender<RuntimeEvent>,
}

impl fmt::Debug for RealExecutorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealExecutorBackend").finish_non_exhaustive()
    }
}

impl RealExecutorBackend {
    pub fn new(ctx: Arc<TaskContext>, events_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { ctx, events_tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for task in tasks {
                tokio::spawn(run_task(task, Arc::clone(&self.ctx), self.events_tx.clone()));
            }
            Ok(())
        })
    }
}
