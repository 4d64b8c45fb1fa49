// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`CoreEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading requests and events from channels
//! - running discovery and sending `ScheduledTask`s to the executor
//! - answering the callers waiting on keys and runs
//!
//! The core is intended to be unit tested without any Tokio, channels,
//! filesystem, or processes.

use std::collections::HashSet;

use crate::dag::{Scheduler, TaskResult};
use crate::engine::event_handlers::{
    handle_discovery_failed, handle_shutdown, handle_task_completion, handle_tasks_discovered,
    CoreStep,
};
use crate::engine::{CoreEvent, GraphOptions};
use crate::tasks::TaskKey;

/// Pure core runtime state.
///
/// This owns:
/// - the DAG scheduler
/// - runtime options (the worker limit)
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    options: GraphOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: GraphOptions) -> Self {
        Self { scheduler, options }
    }

    /// No run is active.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.scheduler.current_run_id()
    }

    /// Keys discovery may reference without descending into them.
    pub fn known_keys(&self) -> HashSet<TaskKey> {
        self.scheduler.known_keys()
    }

    pub fn result_of(&self, key: &str) -> Option<&TaskResult> {
        self.scheduler.result_of(key)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: CoreEvent) -> CoreStep {
        match event {
            CoreEvent::DiscoveryStarted => {
                self.scheduler.begin_discovery();
                CoreStep::default()
            }
            CoreEvent::TasksDiscovered(tasks) => {
                handle_tasks_discovered(&mut self.scheduler, &self.options, tasks)
            }
            CoreEvent::DiscoveryFailed => handle_discovery_failed(&mut self.scheduler, &self.options),
            CoreEvent::TaskCompleted { key, run_id, outcome } => {
                handle_task_completion(&mut self.scheduler, &self.options, &key, run_id, outcome)
            }
            CoreEvent::ShutdownRequested => handle_shutdown(&mut self.scheduler),
        }
    }
}
