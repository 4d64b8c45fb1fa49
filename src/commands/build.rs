// src/commands/build.rs

use std::sync::Arc;

use crate::cli::BuildArgs;
use crate::dag::ProcessResults;
use crate::engine::TaskGraph;
use crate::errors::Result;
use crate::process::{process_modules, WatchOptions};
use crate::project::{Module, Project};
use crate::tasks::{BuildTask, Task, TaskContext};

pub async fn build_command(graph: &TaskGraph, ctx: &Arc<TaskContext>, args: &BuildArgs, watch: WatchOptions) -> Result<ProcessResults> {
    let modules = ctx.project.modules_named(&args.modules)?;
    let force = args.force;

    let handler = move |project: &Project, module: &Arc<Module>| -> Result<Vec<Task>> {
        Ok(vec![Task::Build(BuildTask::new(project, Arc::clone(module), force)?)])
    };

    process_modules(graph, ctx, &modules, &handler, watch).await
}
