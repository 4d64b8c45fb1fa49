// src/commands/deploy.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::info;

use crate::cli::DeployArgs;
use crate::dag::ProcessResults;
use crate::engine::TaskGraph;
use crate::errors::Result;
use crate::process::{process_modules, ModuleHandler, WatchOptions};
use crate::project::{Module, Project};
use crate::tasks::{deploy_tasks_for_module, DeployOptions, Task, TaskContext};

/// Deploys on the first run; redeploys after a change.
struct DeployHandler {
    opts: DeployOptions,
}

impl ModuleHandler for DeployHandler {
    fn tasks_for(&self, project: &Project, module: &Arc<Module>) -> Result<Vec<Task>> {
        deploy_tasks_for_module(project, module, &self.opts)
    }

    fn tasks_on_change(&self, project: &Project, module: &Arc<Module>) -> Result<Vec<Task>> {
        let opts = DeployOptions {
            force: true,
            ..self.opts.clone()
        };
        deploy_tasks_for_module(project, module, &opts)
    }
}

pub async fn deploy_command(
    graph: &TaskGraph,
    ctx: &Arc<TaskContext>,
    args: &DeployArgs,
    mut watch: WatchOptions,
) -> Result<ProcessResults> {
    let project = &ctx.project;

    let services = if args.services.is_empty() {
        project.services()
    } else {
        project.services_named(&args.services)?
    };

    // Owning modules, once each, in name order.
    let modules: Vec<Arc<Module>> = services
        .iter()
        .map(|s| (s.module.name.clone(), Arc::clone(&s.module)))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect();

    watch.hot_reload_modules = project.hot_reload_module_names(&args.hot_reload)?;
    if !watch.hot_reload_modules.is_empty() {
        info!(modules = ?watch.hot_reload_modules, "hot reload enabled");
    }

    let handler = DeployHandler {
        opts: DeployOptions {
            services: (!args.services.is_empty()).then(|| args.services.clone()),
            hot_reload_services: Arc::new(args.hot_reload.iter().cloned().collect::<BTreeSet<_>>()),
            force: args.force,
            force_build: args.force_build,
            watch: watch.events.is_some(),
        },
    };

    process_modules(graph, ctx, &modules, &handler, watch).await
}
