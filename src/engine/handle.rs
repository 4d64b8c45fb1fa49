// src/engine/handle.rs

//! Caller-facing handle to a running task graph.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::dag::{ProcessResults, Scheduler, TaskResult};
use crate::engine::core::CoreRuntime;
use crate::engine::runtime::Runtime;
use crate::engine::{GraphOptions, RuntimeEvent};
use crate::errors::{DevdagError, Result};
use crate::exec::{ExecutorBackend, RealExecutorBackend};
use crate::tasks::{Task, TaskContext, TaskKey};

const REQUEST_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

/// Requests sent from [`TaskGraph`] handles to the runtime.
#[derive(Debug)]
pub enum GraphRequest {
    /// Add tasks to the live graph; each waiter gets the result of its key.
    AddTasks {
        tasks: Vec<Task>,
        waiters: Vec<(TaskKey, oneshot::Sender<TaskResult>)>,
        accepted: oneshot::Sender<Result<()>>,
    },
    /// Add tasks and wait for the whole run to finish.
    ProcessTasks {
        tasks: Vec<Task>,
        reply: oneshot::Sender<Result<ProcessResults>>,
    },
    Shutdown,
}

/// A request whose discovery is in flight.
#[derive(Debug)]
pub enum PendingRequest {
    Add {
        roots: Vec<TaskKey>,
        waiters: Vec<(TaskKey, oneshot::Sender<TaskResult>)>,
        accepted: oneshot::Sender<Result<()>>,
    },
    Process {
        reply: oneshot::Sender<Result<ProcessResults>>,
    },
}

/// Cloneable handle to one graph runtime. All clones feed the same graph,
/// so concurrent callers share runs and deduplicate keys.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    requests: mpsc::Sender<GraphRequest>,
}

impl TaskGraph {
    /// Start a graph runtime that processes tasks for real.
    pub fn spawn(ctx: Arc<TaskContext>, options: GraphOptions) -> (Self, JoinHandle<Result<()>>) {
        Self::spawn_with(ctx, options, RealExecutorBackend::new)
    }

    /// Start a graph runtime with a custom executor backend.
    pub fn spawn_with<E, F>(ctx: Arc<TaskContext>, options: GraphOptions, make_executor: F) -> (Self, JoinHandle<Result<()>>)
    where
        E: ExecutorBackend + 'static,
        F: FnOnce(Arc<TaskContext>, mpsc::Sender<RuntimeEvent>) -> E,
    {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_BUFFER);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        let executor = make_executor(Arc::clone(&ctx), events_tx.clone());
        let core = CoreRuntime::new(Scheduler::new(), options);
        let runtime = Runtime::new(core, ctx, requests_rx, events_rx, events_tx, executor);

        let join = tokio::spawn(runtime.run());
        (Self { requests: requests_tx }, join)
    }

    pub async fn add_task(&self, task: Task) -> Result<TaskHandle> {
        self.add_tasks(vec![task])
            .await?
            .into_iter()
            .next()
            .ok_or(DevdagError::GraphClosed)
    }

    /// Add tasks to the live graph without waiting for them.
    ///
    /// Returns once the tasks and their dependencies are merged, with one
    /// handle per input task. Fails if discovery fails, e.g. on a cycle;
    /// nothing from a failed discovery is executed.
    pub async fn add_tasks(&self, tasks: Vec<Task>) -> Result<Vec<TaskHandle>> {
        let mut waiters = Vec::with_capacity(tasks.len());
        let mut handles = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let (tx, rx) = oneshot::channel();
            let key = task.key();
            waiters.push((key.clone(), tx));
            handles.push(TaskHandle { key, rx });
        }

        let (accepted_tx, accepted_rx) = oneshot::channel();
        self.send(GraphRequest::AddTasks {
            tasks,
            waiters,
            accepted: accepted_tx,
        })
        .await?;

        accepted_rx.await.map_err(|_| DevdagError::GraphClosed)??;
        Ok(handles)
    }

    /// Process `tasks` and everything they depend on, returning when the run
    /// they joined is over.
    pub async fn process_tasks(&self, tasks: Vec<Task>) -> Result<ProcessResults> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(GraphRequest::ProcessTasks { tasks, reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| DevdagError::GraphClosed)?
    }

    /// Ask the runtime to stop. Callers waiting on a run receive partial
    /// results marked as interrupted.
    pub async fn shutdown(&self) {
        if self.requests.send(GraphRequest::Shutdown).await.is_err() {
            debug!("shutdown requested but graph runtime already stopped");
        }
    }

    async fn send(&self, request: GraphRequest) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| DevdagError::GraphClosed)
    }
}

/// Resolves to the result of one task key.
#[derive(Debug)]
pub struct TaskHandle {
    key: TaskKey,
    rx: oneshot::Receiver<TaskResult>,
}

impl TaskHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the key's result. Fails with [`DevdagError::Interrupted`]
    /// if the graph stopped before the key finished.
    pub async fn outcome(self) -> Result<TaskResult> {
        self.rx.await.map_err(|_| DevdagError::Interrupted)
    }
}
