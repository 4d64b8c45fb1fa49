// src/dag/scheduler_step.rs

use crate::tasks::TaskKey;

/// What changed in one scheduler step.
///
/// Tests use this to step the graph by hand and assert on transitions.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Keys whose dependencies all succeeded in this step.
    pub newly_ready: Vec<TaskKey>,
    /// Keys newly marked failed, the failing task first, then blocked
    /// dependents.
    pub newly_failed: Vec<TaskKey>,
    /// Keys whose result became final in this step (success or failure).
    pub finished: Vec<TaskKey>,
    /// This step ended the current run.
    pub run_just_finished: bool,
}
