// src/commands/run.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::info;

use crate::cli::RunArgs;
use crate::commands::handle_task_results;
use crate::engine::TaskGraph;
use crate::errors::{DevdagError, Result};
use crate::plugin::RunResult;
use crate::tasks::{prepare_runtime_context, BuildTask, DeployTask, Task, TaskContext};

/// Build the service's module and deploy its runtime dependencies through
/// the graph, then run the service itself in the foreground.
pub async fn run_command(graph: &TaskGraph, ctx: &Arc<TaskContext>, args: &RunArgs) -> Result<RunResult> {
    let project = &ctx.project;
    let service = project.service(&args.service)?;
    let dependencies = project.services_named(service.dependencies())?;

    let mut tasks = vec![Task::Build(BuildTask::new(project, Arc::clone(&service.module), false)?)];
    for dep in &dependencies {
        tasks.push(Task::Deploy(DeployTask::new(
            project,
            Arc::clone(dep),
            false,
            false,
            false,
            Arc::new(BTreeSet::new()),
        )?));
    }

    let results = graph.process_tasks(tasks).await?;
    handle_task_results("deploy", &results)?;

    let version = project.module_version(&service.module.name)?;
    let runtime_context = prepare_runtime_context(project, &version, &dependencies, &results.task_results)?;

    info!(service = %service.name, version = %version.version_string, "running service");
    let result = ctx.actions.run_service(&service, &runtime_context).await?;

    if !result.success {
        return Err(DevdagError::Other(anyhow!("service '{}' exited unsuccessfully", service.name)));
    }
    Ok(result)
}
