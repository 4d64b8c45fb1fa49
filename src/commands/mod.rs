// src/commands/mod.rs

//! Command handlers behind the CLI subcommands.
//!
//! Each handler turns its arguments into root tasks, drives them through a
//! [`TaskGraph`](crate::engine::TaskGraph) (via the process loop where
//! watching makes sense) and returns the run's results.

use tracing::{error, info, warn};

use crate::dag::ProcessResults;
use crate::errors::{DevdagError, Result};

pub mod build;
pub mod deploy;
pub mod publish;
pub mod run;

pub use build::build_command;
pub use deploy::deploy_command;
pub use publish::publish_command;
pub use run::run_command;
pub use test::test_command;

/// Report the outcome of a command's run.
///
/// Every failed task is logged with its error. Any failure yields
/// [`DevdagError::TasksFailed`]; an interrupted run yields
/// [`DevdagError::Interrupted`].
pub fn handle_task_results(kind: &str, results: &ProcessResults) -> Result<()> {
    for failed in results.failed() {
        match &failed.error {
            Some(err) if err.is_direct() => error!(task = %failed.key, "{err}"),
            Some(err) => warn!(task = %failed.key, "{err}"),
            None => {}
        }
    }

    let count = results.failure_count();
    if count > 0 {
        return Err(DevdagError::TasksFailed {
            count,
            kind: kind.to_string(),
        });
    }
    if results.interrupted {
        return Err(DevdagError::Interrupted);
    }

    if results.restart_required {
        info!("configuration changed; restart devdag to pick it up");
    } else {
        info!(tasks = results.task_results.len(), "done");
    }
    Ok(())
}
