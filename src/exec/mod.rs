// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RealExecutorBackend` the runtime uses in production, and which tests
//!   can replace with a fake implementation.
//! - [`task_runner`] runs one scheduled task body and reports back to the
//!   runtime via `RuntimeEvent`s.
//! - [`command`] runs shell commands for the local plugin backend.
//! - [`long_lived`] keeps service processes alive and waits for readiness
//!   (`ready_on_stdout`, `ready_after`).

pub mod backend;
pub mod command;
pub mod long_lived;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use command::{run_checked, run_command, CommandOutput, CommandSpec};
