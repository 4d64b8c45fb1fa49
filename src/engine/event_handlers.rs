// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info};

use crate::dag::{DiscoveredTask, ScheduledTask, Scheduler, SchedulerStep, TaskResult, TaskResults};
use crate::engine::GraphOptions;
use crate::errors::TaskError;
use crate::tasks::TaskOutput;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// These keys reached a final result; answer whoever waits on them.
    ResolveTasks(Vec<TaskResult>),
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// The run ended (or was cut short); answer whoever waits on it.
    FinishRun {
        run_id: u64,
        results: TaskResults,
        interrupted: bool,
    },
    /// Request that the runtime exits.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl Default for CoreStep {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }
}

/// Merge freshly discovered tasks into the current run.
pub fn handle_tasks_discovered(
    scheduler: &mut Scheduler,
    options: &GraphOptions,
    tasks: Vec<DiscoveredTask>,
) -> CoreStep {
    debug!(run_id = ?scheduler.current_run_id(), count = tasks.len(), "merging discovered tasks");
    let step = scheduler.merge(tasks);
    follow_up(scheduler, options, step)
}

pub fn handle_discovery_failed(scheduler: &mut Scheduler, options: &GraphOptions) -> CoreStep {
    let step = scheduler.abort_discovery();
    follow_up(scheduler, options, step)
}

/// Handle a task completion event.
///
/// Completions from an earlier run (e.g. one that was interrupted) are
/// ignored.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    options: &GraphOptions,
    key: &str,
    run_id: u64,
    outcome: Result<TaskOutput, TaskError>,
) -> CoreStep {
    if scheduler.current_run_id() != Some(run_id) {
        debug!(task = %key, run_id, "completion from a stale run; ignoring");
        return CoreStep::default();
    }

    let step = scheduler.complete(key, outcome);
    follow_up(scheduler, options, step)
}

/// Interrupt the active run, if any, and stop the runtime.
pub fn handle_shutdown(scheduler: &mut Scheduler) -> CoreStep {
    let mut commands = Vec::new();

    if let Some(run_id) = scheduler.interrupt() {
        info!(run_id, "shutdown requested; reporting partial results");
        commands.push(CoreCommand::FinishRun {
            run_id,
            results: scheduler.results().clone(),
            interrupted: true,
        });
    }
    commands.push(CoreCommand::RequestExit);

    CoreStep {
        commands,
        keep_running: false,
    }
}

/// Translate a scheduler step into commands: resolve finished keys, hand
/// out newly runnable work, then report the end of the run.
fn follow_up(
    scheduler: &mut Scheduler,
    options: &GraphOptions,
    step: SchedulerStep,
) -> CoreStep {
    let mut commands = Vec::new();

    let finished: Vec<TaskResult> = step
        .finished
        .iter()
        .filter_map(|k| scheduler.result_of(k).cloned())
        .collect();
    if !finished.is_empty() {
        commands.push(CoreCommand::ResolveTasks(finished));
    }

    let ready = scheduler.dispatch(options.concurrency);
    if !ready.is_empty() {
        commands.push(CoreCommand::DispatchTasks(ready));
    }

    if step.run_just_finished {
        // Only the most recently started run can end.
        commands.push(CoreCommand::FinishRun {
            run_id: scheduler.last_run_id().unwrap_or_default(),
            results: scheduler.results().clone(),
            interrupted: false,
        });
    }

    CoreStep {
        commands,
        keep_running: true,
    }
}

