// src/dag/scheduler.rs

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::results::{TaskResult, TaskResults};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{DiscoveredTask, RunState, ScheduledTask, TaskNode, TaskRunState};
use crate::errors::TaskError;
use crate::tasks::{TaskKey, TaskOutput};

/// Scheduler holds the task graph plus mutable per-run state.
///
/// It is responsible for:
/// - merging discovered tasks into the graph, deduplicated by key
/// - deciding when a task is ready to run (deps satisfied)
/// - recording results and failing dependents of failed tasks
/// - deciding when a run is over
///
/// The scheduler never awaits anything. The engine feeds it events and acts
/// on the steps it returns.
#[derive(Debug, Default)]
pub struct Scheduler {
    graph: DagGraph,
    nodes: HashMap<TaskKey, TaskNode>,
    results: TaskResults,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
    next_seq: u64,
    /// Discoveries started but not yet merged or aborted. A run cannot end
    /// while any are outstanding.
    pending_discoveries: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// The most recently started run, active or not.
    pub fn last_run_id(&self) -> Option<u64> {
        (self.run_counter > 0).then_some(self.run_counter)
    }

    pub fn run_state_of(&self, key: &str) -> TaskRunState {
        self.nodes.get(key).map(|n| n.run_state).into()
    }

    /// Result recorded for `key` in the current (or last finished) run.
    pub fn result_of(&self, key: &str) -> Option<&TaskResult> {
        self.results.get(key)
    }

    /// Results of the current (or last finished) run.
    pub fn results(&self) -> &TaskResults {
        &self.results
    }

    pub fn contains(&self, key: &str) -> bool {
        self.graph.contains(key)
    }

    /// Keys already merged into the graph; discovery does not descend into
    /// these again.
    pub fn known_keys(&self) -> HashSet<TaskKey> {
        self.graph.keys().map(str::to_string).collect()
    }

    pub fn running_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| n.run_state == RunState::Running)
            .count()
    }

    /// Start a new run. The graph and results of the previous run are
    /// dropped; every run rediscovers what it needs.
    pub fn start_new_run(&mut self) -> u64 {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        self.graph.clear();
        self.nodes.clear();
        self.results.clear();
        self.pending_discoveries = 0;

        debug!(run_id = self.run_counter, "scheduler: starting new run");
        self.run_counter
    }

    /// Announce that a discovery is in flight. Starts a run if none is
    /// active. Returns the run the discovery belongs to.
    pub fn begin_discovery(&mut self) -> u64 {
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => self.start_new_run(),
        };
        self.pending_discoveries += 1;
        run_id
    }

    /// Give up on a discovery without merging anything, e.g. because it
    /// found a cycle. The run may end as a result.
    pub fn abort_discovery(&mut self) -> SchedulerStep {
        self.end_discovery();
        SchedulerStep {
            run_just_finished: self.maybe_finish_run(),
            ..SchedulerStep::default()
        }
    }

    /// Merge tasks produced by one discovery into the graph.
    ///
    /// Tasks arrive dependencies-first. Keys already in the graph are
    /// skipped, so a key is only ever processed once per run. Tasks that
    /// arrive with an error, or that name a dependency nobody discovered,
    /// fail right away along with everything downstream of them.
    pub fn merge(&mut self, discovered: Vec<DiscoveredTask>) -> SchedulerStep {
        self.end_discovery();
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => self.start_new_run(),
        };

        let mut failures: Vec<(TaskKey, TaskError)> = Vec::new();
        let mut added = 0usize;

        for item in discovered {
            if !self.graph.insert(&item.key, &item.deps) {
                debug!(task = %item.key, "task already in graph; deduplicated");
                continue;
            }
            if let Some(error) = item.error {
                failures.push((item.key.clone(), error));
            } else if let Some(dep) = item.deps.iter().find(|d| !self.graph.contains(d)) {
                warn!(task = %item.key, dependency = %dep, "dependency was never discovered; failing task");
                failures.push((
                    item.key.clone(),
                    TaskError::Configuration(format!("dependency '{dep}' of '{}' is not in the graph", item.key)),
                ));
            }
            self.nodes.insert(
                item.key.clone(),
                TaskNode {
                    key: item.key,
                    task: item.task,
                    deps: item.deps,
                    run_state: RunState::Pending,
                    seq: self.next_seq,
                },
            );
            self.next_seq += 1;
            added += 1;
        }

        debug!(run_id, added, total = self.graph.len(), "scheduler: merged discovered tasks");

        let mut step = SchedulerStep::default();
        let mut manager = StateManager::new(&self.graph, &mut self.nodes, &mut self.results, run_id);

        for (key, error) in failures {
            if step.newly_failed.contains(&key) {
                continue;
            }
            manager.record_failure(&key, error);
            step.newly_failed.push(key.clone());
            step.newly_failed.extend(manager.mark_dependents_failed(&key));
        }

        let (ready, failed) = manager.promote_pending();
        step.newly_ready = ready;
        step.newly_failed.extend(failed);
        step.finished = step.newly_failed.clone();
        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Hand out up to `limit - running` ready tasks.
    pub fn dispatch(&mut self, limit: usize) -> Vec<ScheduledTask> {
        let Some(run_id) = self.current_run_id else {
            return Vec::new();
        };
        let slots = limit.saturating_sub(self.running_count());
        let mut manager = StateManager::new(&self.graph, &mut self.nodes, &mut self.results, run_id);
        manager.take_ready(slots)
    }

    /// Record the outcome of a running task.
    pub fn complete(&mut self, key: &str, outcome: Result<TaskOutput, TaskError>) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(task = %key, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        if self.nodes.get(key).map(|n| n.run_state) != Some(RunState::Running) {
            warn!(task = %key, "completion for a task that is not running; ignoring");
            return SchedulerStep::default();
        }

        let mut step = SchedulerStep::default();
        let mut manager = StateManager::new(&self.graph, &mut self.nodes, &mut self.results, run_id);

        match outcome {
            Ok(output) => {
                debug!(task = %key, run_id, "task completed successfully");
                manager.record_success(key, output);
                step.finished.push(key.to_string());
                let (ready, failed) = manager.promote_pending();
                step.newly_ready = ready;
                step.newly_failed = failed;
            }
            Err(error) => {
                warn!(task = %key, run_id, error = %error, "task failed; failing dependents in this run");
                manager.record_failure(key, error);
                step.newly_failed.push(key.to_string());
                step.newly_failed.extend(manager.mark_dependents_failed(key));
            }
        }

        for failed in &step.newly_failed {
            if !step.finished.contains(failed) {
                step.finished.push(failed.clone());
            }
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Abandon the active run. Results recorded so far are kept; tasks
    /// still running are left to finish on their own and their outcomes
    /// are ignored.
    pub fn interrupt(&mut self) -> Option<u64> {
        let run_id = self.current_run_id.take()?;
        self.pending_discoveries = 0;
        info!(run_id, "scheduler: run interrupted");
        Some(run_id)
    }

    fn end_discovery(&mut self) {
        self.pending_discoveries = self.pending_discoveries.saturating_sub(1);
    }

    /// Clear `current_run_id` once nothing is outstanding.
    ///
    /// Returns `true` if this call ended the run.
    fn maybe_finish_run(&mut self) -> bool {
        let Some(run_id) = self.current_run_id else {
            return false;
        };
        if self.pending_discoveries > 0 {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.nodes, &mut self.results, run_id);
        if manager.all_tasks_terminal() {
            info!(run_id, tasks = self.nodes.len(), "scheduler: all tasks terminal; run finished");
            self.current_run_id = None;
            true
        } else {
            false
        }
    }
}
