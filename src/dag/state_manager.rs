// src/dag/state_manager.rs

//! Per-run state transitions for graph nodes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::dag::graph::DagGraph;
use crate::dag::results::{TaskResult, TaskResults};
use crate::dag::task_info::{RunState, ScheduledTask, TaskNode};
use crate::errors::TaskError;
use crate::tasks::{TaskKey, TaskOutput};

/// Mutable view over the scheduler's nodes and results for one step.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    nodes: &'a mut HashMap<TaskKey, TaskNode>,
    results: &'a mut TaskResults,
    run_id: u64,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        nodes: &'a mut HashMap<TaskKey, TaskNode>,
        results: &'a mut TaskResults,
        run_id: u64,
    ) -> Self {
        Self {
            graph,
            nodes,
            results,
            run_id,
        }
    }

    /// Move `Pending` nodes forward: to `Ready` when every dependency
    /// succeeded, to `Failed` when any dependency failed.
    ///
    /// Returns `(newly_ready, newly_failed)`.
    pub fn promote_pending(&mut self) -> (Vec<TaskKey>, Vec<TaskKey>) {
        let mut pending: Vec<(u64, TaskKey)> = self
            .nodes
            .values()
            .filter(|n| n.run_state == RunState::Pending)
            .map(|n| (n.seq, n.key.clone()))
            .collect();
        pending.sort();

        let mut newly_ready = Vec::new();
        let mut newly_failed = Vec::new();

        for (_, key) in pending {
            // An earlier iteration may already have failed this node.
            let Some(node) = self.nodes.get(&key) else { continue };
            if node.run_state != RunState::Pending {
                continue;
            }

            let failed_dep = node.deps.iter().find(|d| {
                self.nodes
                    .get(d.as_str())
                    .is_some_and(|n| n.run_state == RunState::Failed)
            });

            if let Some(dep) = failed_dep.cloned() {
                let cause = self.error_of(&dep);
                let error = TaskError::dependency_failed(&dep, &cause);
                self.record_failure(&key, error);
                newly_failed.push(key.clone());
                newly_failed.extend(self.mark_dependents_failed(&key));
                continue;
            }

            let satisfied = node.deps.iter().all(|d| {
                self.nodes
                    .get(d.as_str())
                    .is_some_and(|n| n.run_state == RunState::Succeeded)
            });

            if satisfied {
                if let Some(node) = self.nodes.get_mut(&key) {
                    node.run_state = RunState::Ready;
                    debug!(task = %key, run_id = self.run_id, "dependencies satisfied; marking Ready");
                }
                newly_ready.push(key);
            }
        }

        (newly_ready, newly_failed)
    }

    /// Record a successful outcome for a running node.
    pub fn record_success(&mut self, key: &str, output: TaskOutput) {
        self.record(key, RunState::Succeeded, Some(output), None);
    }

    /// Record a failure for `key` (running or still waiting).
    pub fn record_failure(&mut self, key: &str, error: TaskError) {
        self.record(key, RunState::Failed, None, Some(error));
    }

    /// Fail every not-yet-started node downstream of `failed_key`.
    ///
    /// Returns the keys newly marked failed, excluding `failed_key`.
    pub fn mark_dependents_failed(&mut self, failed_key: &str) -> Vec<TaskKey> {
        let mut stack: Vec<(TaskKey, TaskKey)> = self
            .graph
            .dependents_of(failed_key)
            .iter()
            .map(|d| (d.clone(), failed_key.to_string()))
            .collect();

        let mut newly_failed = Vec::new();

        while let Some((key, because_of)) = stack.pop() {
            let waiting = self
                .nodes
                .get(&key)
                .is_some_and(|n| matches!(n.run_state, RunState::Pending | RunState::Ready));
            if !waiting {
                continue;
            }

            let cause = self.error_of(&because_of);
            self.record_failure(&key, TaskError::dependency_failed(&because_of, &cause));
            debug!(task = %key, dependency = %because_of, "failing dependent due to upstream failure");

            stack.extend(
                self.graph
                    .dependents_of(&key)
                    .iter()
                    .map(|d| (d.clone(), key.clone())),
            );
            newly_failed.push(key);
        }

        newly_failed
    }

    /// Pick up to `limit` ready nodes, preferring those that unblock the most
    /// downstream work, mark them `Running` and return them.
    pub fn take_ready(&mut self, limit: usize) -> Vec<ScheduledTask> {
        if limit == 0 {
            return Vec::new();
        }

        let mut ready: Vec<(usize, u64, TaskKey)> = self
            .nodes
            .values()
            .filter(|n| n.run_state == RunState::Ready)
            .map(|n| (self.graph.downstream_count(&n.key), n.seq, n.key.clone()))
            .collect();
        ready.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut scheduled = Vec::new();
        for (_, _, key) in ready.into_iter().take(limit) {
            let dependency_results = self.dependency_results(&key);
            if let Some(node) = self.nodes.get_mut(&key) {
                node.run_state = RunState::Running;
                info!(task = %key, run_id = self.run_id, "scheduling task");
                scheduled.push(ScheduledTask {
                    key,
                    task: node.task.clone(),
                    dependency_results,
                    run_id: self.run_id,
                });
            }
        }

        scheduled
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.nodes.values().all(|n| n.run_state.is_terminal())
    }

    fn dependency_results(&self, key: &str) -> TaskResults {
        self.graph
            .dependencies_of(key)
            .iter()
            .filter_map(|d| self.results.get(d).map(|r| (d.clone(), r.clone())))
            .collect()
    }

    fn error_of(&self, key: &str) -> TaskError {
        self.results
            .get(key)
            .and_then(|r| r.error.clone())
            .unwrap_or_else(|| TaskError::Execution(format!("task '{key}' failed")))
    }

    fn record(&mut self, key: &str, state: RunState, output: Option<TaskOutput>, error: Option<TaskError>) {
        let dependency_results = Arc::new(self.dependency_results(key));
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.run_state = state;

        self.results.insert(
            key.to_string(),
            TaskResult {
                key: key.to_string(),
                task_type: node.task.task_type(),
                description: node.task.description(),
                output,
                error,
                dependency_results,
            },
        );
    }
}
