// src/dag/results.rs

//! Per-key results collected during a run.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::TaskError;
use crate::tasks::{TaskKey, TaskOutput};
use crate::types::TaskType;

pub type TaskResults = BTreeMap<TaskKey, TaskResult>;

/// Final outcome of one task key in a run.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub key: TaskKey,
    pub task_type: TaskType,
    pub description: String,
    pub output: Option<TaskOutput>,
    pub error: Option<TaskError>,
    /// Results of the task's direct dependencies.
    pub dependency_results: Arc<TaskResults>,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// What a call to `process_tasks` returns.
#[derive(Debug, Clone, Default)]
pub struct ProcessResults {
    pub task_results: TaskResults,
    /// Set by the watch loop when the project config changed.
    pub restart_required: bool,
    /// The run was cut short; results are partial.
    pub interrupted: bool,
}

impl ProcessResults {
    pub fn failed(&self) -> impl Iterator<Item = &TaskResult> {
        self.task_results.values().filter(|r| !r.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// Only a complete run without failures counts as success.
    pub fn is_success(&self) -> bool {
        !self.interrupted && self.failure_count() == 0
    }
}
