// src/exec/task_runner.rs

//! Runs one scheduled task body and reports its outcome.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::TaskError;
use crate::tasks::{TaskContext, TaskOutput};

/// Process a single task and emit its `TaskCompleted` event.
///
/// The body runs in its own tokio task so that a panic is caught and
/// reported as [`TaskError::Panicked`] instead of leaving the key running
/// forever.
pub async fn run_task(task: ScheduledTask, ctx: Arc<TaskContext>, events_tx: mpsc::Sender<RuntimeEvent>) {
    let key = task.key.clone();
    let run_id = task.run_id;
    let started = Instant::now();

    info!(task = %key, run_id, "{}", task.task.description());

    let body = tokio::spawn(async move {
        task.task
            .process(&ctx, &task.dependency_results)
            .await
            .map_err(|e| TaskError::from(&e))
    });

    let outcome: Result<TaskOutput, TaskError> = match body.await {
        Ok(outcome) => outcome,
        Err(join_err) => {
            error!(task = %key, run_id, error = %join_err, "task panicked");
            Err(TaskError::Panicked(join_err.to_string()))
        }
    };

    match &outcome {
        Ok(_) => info!(
            task = %key,
            run_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "task succeeded"
        ),
        Err(err) => warn!(task = %key, run_id, error = %err, "task failed"),
    }

    if events_tx
        .send(RuntimeEvent::TaskCompleted { key: key.clone(), run_id, outcome })
        .await
        .is_err()
    {
        warn!(task = %key, run_id, "runtime stopped before task completion could be reported");
    }
}
