// src/engine/runtime.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::{discover, ProcessResults, ScheduledTask, TaskResult};
use crate::errors::{DevdagError, Result};
use crate::exec::ExecutorBackend;
use crate::tasks::{Task, TaskContext, TaskKey};

use super::core::CoreRuntime;
use super::handle::{GraphRequest, PendingRequest};
use super::{CoreCommand, CoreEvent, RuntimeEvent};

/// Drives the DAG scheduler in response to requests and events, and
/// delegates task processing to an `ExecutorBackend`.
///
/// This is an IO shell around `CoreRuntime`, which contains all the graph
/// semantics. This struct handles async IO: reading channels, running
/// discovery, dispatching tasks and answering waiters.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    ctx: Arc<TaskContext>,
    requests_rx: mpsc::Receiver<GraphRequest>,
    events_rx: mpsc::Receiver<RuntimeEvent>,
    events_tx: mpsc::Sender<RuntimeEvent>,
    executor: E,
    key_waiters: HashMap<TaskKey, Vec<oneshot::Sender<TaskResult>>>,
    run_waiters: Vec<oneshot::Sender<Result<ProcessResults>>>,
    requests_open: bool,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("key_waiters", &self.key_waiters.len())
            .field("run_waiters", &self.run_waiters.len())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        ctx: Arc<TaskContext>,
        requests_rx: mpsc::Receiver<GraphRequest>,
        events_rx: mpsc::Receiver<RuntimeEvent>,
        events_tx: mpsc::Sender<RuntimeEvent>,
        executor: E,
    ) -> Self {
        Self {
            core,
            ctx,
            requests_rx,
            events_rx,
            events_tx,
            executor,
            key_waiters: HashMap::new(),
            run_waiters: Vec::new(),
            requests_open: true,
        }
    }

    /// Main event loop.
    ///
    /// Runs until shutdown is requested, or until every handle is dropped
    /// and no run is active.
    pub async fn run(mut self) -> Result<()> {
        info!(project = %self.ctx.project.name(), "devdag graph runtime started");

        loop {
            let keep_running = tokio::select! {
                request = self.requests_rx.recv(), if self.requests_open => match request {
                    Some(request) => self.handle_request(request).await?,
                    None => {
                        debug!("all graph handles dropped");
                        self.requests_open = false;
                        true
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await?,
            };

            if !keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
            if !self.requests_open && self.core.is_idle() {
                break;
            }
        }

        info!("graph runtime exiting");
        Ok(())
    }

    async fn handle_request(&mut self, request: GraphRequest) -> Result<bool> {
        match request {
            GraphRequest::AddTasks { tasks, waiters, accepted } => {
                let roots = tasks.iter().map(Task::key).collect();
                self.start_discovery(tasks, PendingRequest::Add { roots, waiters, accepted });
                Ok(true)
            }
            GraphRequest::ProcessTasks { tasks, reply } => {
                self.start_discovery(tasks, PendingRequest::Process { reply });
                Ok(true)
            }
            GraphRequest::Shutdown => {
                let step = self.core.step(CoreEvent::ShutdownRequested);
                self.execute(step.commands).await?;
                Ok(step.keep_running)
            }
        }
    }

    async fn handle_event(&mut self, event: RuntimeEvent) -> Result<bool> {
        match event {
            RuntimeEvent::Discovered { request, outcome } => match outcome {
                Ok(tasks) => {
                    let roots = self.register(request);
                    let step = self.core.step(CoreEvent::TasksDiscovered(tasks));
                    self.execute(step.commands).await?;
                    self.resolve_existing(&roots);
                    Ok(step.keep_running)
                }
                Err(err) => {
                    warn!(error = %err, "task discovery failed; nothing from this request will run");
                    match request {
                        PendingRequest::Add { accepted, .. } => {
                            let _ = accepted.send(Err(err));
                        }
                        PendingRequest::Process { reply } => {
                            let _ = reply.send(Err(err));
                        }
                    }
                    let step = self.core.step(CoreEvent::DiscoveryFailed);
                    self.execute(step.commands).await?;
                    Ok(step.keep_running)
                }
            },
            RuntimeEvent::TaskCompleted { key, run_id, outcome } => {
                let step = self.core.step(CoreEvent::TaskCompleted { key, run_id, outcome });
                self.execute(step.commands).await?;
                Ok(step.keep_running)
            }
        }
    }

    /// Tell the core a discovery is in flight and run it in the background.
    /// Panics inside dependency lookups surface as discovery errors.
    ///
    /// Dependency lookups resolve module versions, which may shell out to
    /// source control synchronously, so discovery runs on the blocking pool.
    fn start_discovery(&mut self, tasks: Vec<Task>, request: PendingRequest) {
        self.core.step(CoreEvent::DiscoveryStarted);
        let known: HashSet<TaskKey> = self.core.known_keys();
        let ctx = Arc::clone(&self.ctx);
        let events_tx = self.events_tx.clone();
        let handle = tokio::runtime::Handle::current();

        debug!(roots = tasks.len(), known = known.len(), "starting discovery");

        tokio::spawn(async move {
            let inner = tokio::task::spawn_blocking(move || handle.block_on(discover(tasks, &ctx, &known)));
            let outcome = match inner.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(DevdagError::Other(anyhow!("task discovery panicked: {join_err}"))),
            };
            if events_tx
                .send(RuntimeEvent::Discovered { request, outcome })
                .await
                .is_err()
            {
                debug!("graph runtime stopped before discovery finished");
            }
        });
    }

    /// Attach a request's waiters. Returns the root keys to check for
    /// results that already exist.
    fn register(&mut self, request: PendingRequest) -> Vec<TaskKey> {
        match request {
            PendingRequest::Add { roots, waiters, accepted } => {
                for (key, waiter) in waiters {
                    self.key_waiters.entry(key).or_default().push(waiter);
                }
                let _ = accepted.send(Ok(()));
                roots
            }
            PendingRequest::Process { reply } => {
                self.run_waiters.push(reply);
                Vec::new()
            }
        }
    }

    fn resolve_existing(&mut self, roots: &[TaskKey]) {
        for key in roots {
            if let Some(result) = self.core.result_of(key).cloned() {
                self.resolve(result);
            }
        }
    }

    fn resolve(&mut self, result: TaskResult) {
        if let Some(waiters) = self.key_waiters.remove(&result.key) {
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }
    }

    /// Execute commands from the core, in order.
    async fn execute(&mut self, commands: Vec<CoreCommand>) -> Result<()> {
        for command in commands {
            match command {
                CoreCommand::ResolveTasks(results) => {
                    for result in results {
                        self.resolve(result);
                    }
                }
                CoreCommand::DispatchTasks(tasks) => {
                    self.spawn_ready(tasks).await?;
                }
                CoreCommand::FinishRun {
                    run_id,
                    results,
                    interrupted,
                } => {
                    let failed = results.values().filter(|r| !r.is_success()).count();
                    info!(run_id, tasks = results.len(), failed, interrupted, "run finished");
                    for waiter in self.run_waiters.drain(..) {
                        let _ = waiter.send(Ok(ProcessResults {
                            task_results: results.clone(),
                            restart_required: false,
                            interrupted,
                        }));
                    }
                }
                CoreCommand::RequestExit => {
                    info!("core issued RequestExit command");
                }
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let keys: Vec<_> = tasks.iter().map(|t| t.key.as_str()).collect();
        debug!(?keys, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
