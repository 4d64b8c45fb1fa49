// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`discovery`] expands root tasks into their dependency closure.
//! - [`graph`] holds the adjacency of the merged task graph.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run, and when dependents can be scheduled.
//! - [`task_info`] provides graph nodes and scheduled task types.
//! - [`results`] holds per-key results of a run.
//! - [`state_manager`] manages per-run state transitions.

pub mod discovery;
pub mod graph;
pub mod results;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use discovery::discover;
pub use graph::DagGraph;
pub use results::{ProcessResults, TaskResult, TaskResults};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{DiscoveredTask, ScheduledTask, TaskRunState};
