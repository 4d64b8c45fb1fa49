// src/commands/publish.rs

use std::sync::Arc;

use crate::cli::PublishArgs;
use crate::dag::ProcessResults;
use crate::engine::TaskGraph;
use crate::errors::Result;
use crate::tasks::{publish_tasks, TaskContext};

/// Publish runs once; it never watches.
pub async fn publish_command(graph: &TaskGraph, ctx: &Arc<TaskContext>, args: &PublishArgs) -> Result<ProcessResults> {
    let modules = ctx.project.modules_named(&args.modules)?;
    let tasks = publish_tasks(&ctx.project, &modules, args.force_build, args.allow_dirty)?;
    graph.process_tasks(tasks).await
}
