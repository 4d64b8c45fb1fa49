// src/process.rs

//! The process loop: one graph run over the requested modules, then, in
//! watch mode, incremental re-submission of whatever a change affects.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::{ProcessResults, TaskResults};
use crate::engine::{TaskGraph, TaskHandle};
use crate::errors::Result;
use crate::project::{Module, Project};
use crate::tasks::{tasks_for_hot_reload, Task, TaskContext};
use crate::watch::WatchEvent;

/// Produces the root tasks for one module.
pub trait ModuleHandler: Send + Sync {
    /// Root tasks for the initial run.
    fn tasks_for(&self, project: &Project, module: &Arc<Module>) -> Result<Vec<Task>>;

    /// Root tasks after the module (or something it depends on) changed.
    fn tasks_on_change(&self, project: &Project, module: &Arc<Module>) -> Result<Vec<Task>> {
        self.tasks_for(project, module)
    }
}

impl<F> ModuleHandler for F
where
    F: Fn(&Project, &Arc<Module>) -> Result<Vec<Task>> + Send + Sync,
{
    fn tasks_for(&self, project: &Project, module: &Arc<Module>) -> Result<Vec<Task>> {
        self(project, module)
    }
}

/// Watch-mode inputs. Without a receiver the loop returns after the
/// initial run.
#[derive(Debug, Default)]
pub struct WatchOptions {
    pub events: Option<mpsc::Receiver<WatchEvent>>,
    /// Modules whose changes are applied with a hot reload instead of
    /// going through the graph.
    pub hot_reload_modules: BTreeSet<String>,
}

/// Process `modules` through `graph`, then keep reacting to changes while
/// watching.
///
/// The returned results are those of the initial run. In watch mode the
/// loop ends when the event stream ends, on [`WatchEvent::Shutdown`], or
/// with `restart_required` set when the project config changed.
pub async fn process_modules(
    graph: &TaskGraph,
    ctx: &Arc<TaskContext>,
    modules: &[Arc<Module>],
    handler: &dyn ModuleHandler,
    options: WatchOptions,
) -> Result<ProcessResults> {
    let project = &ctx.project;

    let mut tasks = Vec::new();
    for module in modules {
        tasks.extend(handler.tasks_for(project, module)?);
    }

    info!(modules = modules.len(), tasks = tasks.len(), "processing tasks");
    let mut results = graph.process_tasks(tasks).await?;

    let Some(mut events) = options.events else {
        return Ok(results);
    };
    if results.interrupted {
        return Ok(results);
    }

    let requested: HashSet<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    info!("waiting for code changes");

    while let Some(event) = events.recv().await {
        match event {
            WatchEvent::ModuleChanged(name) => {
                on_module_changed(graph, ctx, &requested, handler, &options.hot_reload_modules, &name).await;
            }
            WatchEvent::ConfigChanged => {
                info!("project configuration changed; restart required");
                results.restart_required = true;
                return Ok(results);
            }
            WatchEvent::Shutdown => break,
        }
    }

    debug!("watch loop finished");
    Ok(results)
}

async fn on_module_changed(
    graph: &TaskGraph,
    ctx: &Arc<TaskContext>,
    requested: &HashSet<&str>,
    handler: &dyn ModuleHandler,
    hot_reload_modules: &BTreeSet<String>,
    name: &str,
) {
    let project = &ctx.project;
    info!(module = %name, "module changed");
    project.invalidate_versions();
    project.warm_versions().await;

    if hot_reload_modules.contains(name) {
        hot_reload(ctx, name).await;
    }

    let Ok(changed) = project.module(name) else {
        warn!(module = %name, "change reported for unknown module");
        return;
    };

    let affected: Vec<Arc<Module>> = std::iter::once(changed)
        .chain(project.dependants_of(name))
        .filter(|m| !hot_reload_modules.contains(&m.name))
        .filter(|m| requested.contains(m.name.as_str()))
        .collect();

    for module in affected {
        let tasks = match handler.tasks_on_change(project, &module) {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(module = %module.name, error = %err, "could not prepare tasks for changed module");
                continue;
            }
        };
        if tasks.is_empty() {
            continue;
        }

        match graph.add_tasks(tasks).await {
            Ok(handles) => {
                tokio::spawn(log_outcomes(handles));
            }
            Err(err) => error!(module = %module.name, error = %err, "could not add tasks for changed module"),
        }
    }
}

/// Run hot reloads right away; they never enter the graph.
async fn hot_reload(ctx: &Arc<TaskContext>, name: &str) {
    let names = BTreeSet::from([name.to_string()]);
    let tasks = match tasks_for_hot_reload(&ctx.project, &names) {
        Ok(tasks) => tasks,
        Err(err) => {
            error!(module = %name, error = %err, "could not prepare hot reload");
            return;
        }
    };

    for task in tasks {
        match task.process(ctx, &TaskResults::new()).await {
            Ok(_) => info!(task = %task.key(), "hot reload done"),
            Err(err) => error!(task = %task.key(), error = %err, "hot reload failed"),
        }
    }
}

async fn log_outcomes(handles: Vec<TaskHandle>) {
    for handle in handles {
        let key = handle.key().to_string();
        match handle.outcome().await {
            Ok(result) => match &result.error {
                None => info!(task = %key, "{} done", result.description),
                Some(err) => error!(task = %key, error = %err, "task failed"),
            },
            Err(err) => debug!(task = %key, error = %err, "no result for task"),
        }
    }
}
