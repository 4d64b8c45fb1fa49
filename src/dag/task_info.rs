// src/dag/task_info.rs

//! Graph nodes and the per-run state they move through.

use crate::dag::results::TaskResults;
use crate::errors::TaskError;
use crate::tasks::{Task, TaskKey};

/// Per-run state of a node (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting on dependencies.
    Pending,
    /// Dependencies succeeded; waiting for a free worker.
    Ready,
    /// Handed to the executor.
    Running,
    Succeeded,
    /// Failed itself, or blocked by a failed dependency.
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// Public, read-only view of a key's state in the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    NotInRun,
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Ready) => TaskRunState::Ready,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::Succeeded) => TaskRunState::Succeeded,
            Some(RunState::Failed) => TaskRunState::Failed,
        }
    }
}

/// A task merged into the graph.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub key: TaskKey,
    pub task: Task,
    pub deps: Vec<TaskKey>,
    pub run_state: RunState,
    /// Insertion order, used to break ties between ready tasks.
    pub seq: u64,
}

/// A task produced by discovery, with the keys of its direct dependencies.
///
/// Discovery emits these dependencies-first.
#[derive(Debug, Clone)]
pub struct DiscoveredTask {
    pub key: TaskKey,
    pub task: Task,
    pub deps: Vec<TaskKey>,
    /// Set when the task's dependencies could not be computed. The task
    /// fails on merge and takes its dependents with it.
    pub error: Option<TaskError>,
}

impl DiscoveredTask {
    pub fn new(task: Task, deps: Vec<TaskKey>) -> Self {
        Self {
            key: task.key(),
            task,
            deps,
            error: None,
        }
    }

    pub fn failed(task: Task, error: TaskError) -> Self {
        Self {
            key: task.key(),
            task,
            deps: Vec::new(),
            error: Some(error),
        }
    }
}

/// A task the scheduler wants the executor to process now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub key: TaskKey,
    pub task: Task,
    /// Results of the task's direct dependencies, all successful.
    pub dependency_results: TaskResults,
    /// All tasks dispatched within the same run share this id.
    pub run_id: u64,
}
