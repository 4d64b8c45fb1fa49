// src/tasks/helpers.rs

//! Constructors for the root task sets commands submit.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::dag::TaskResults;
use crate::errors::{DevdagError, Result};
use crate::plugin::{RuntimeContext, MODULE_VERSION_ENV};
use crate::project::{Module, Project, Service};
use crate::tasks::{DeployTask, HotReloadTask, PublishTask, Task, TaskOutput, TestTask};
use crate::types::TaskType;
use crate::vcs::ModuleVersion;

/// Env var name carrying a dependency service's version.
pub fn service_version_env(service: &str) -> String {
    let name: String = service
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("DEVDAG_SERVICE_{name}_VERSION")
}

/// Environment for an action on a module at `version` that talks to
/// `dependencies` at runtime.
///
/// A dependency deployed in the same run reports the version it is running
/// through its result in `dependency_results`. Any other dependency gets its
/// resolved module version.
pub fn prepare_runtime_context(
    project: &Project,
    version: &ModuleVersion,
    dependencies: &[Arc<Service>],
    dependency_results: &TaskResults,
) -> Result<RuntimeContext> {
    let mut ctx = RuntimeContext::default();
    ctx.env
        .insert(MODULE_VERSION_ENV.to_string(), version.version_string.clone());

    for dep in dependencies {
        let deployed = dependency_results
            .get(&format!("{}.{}", TaskType::Deploy, dep.name))
            .and_then(|result| match &result.output {
                Some(TaskOutput::Deploy(status)) => status.version.clone(),
                _ => None,
            });
        let dep_version = match deployed {
            Some(running) => running,
            None => project.module_version(&dep.module.name)?.version_string,
        };
        ctx.env.insert(service_version_env(&dep.name), dep_version);
    }

    Ok(ctx)
}

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Restrict to these services; `None` deploys every service.
    pub services: Option<Vec<String>>,
    pub hot_reload_services: Arc<BTreeSet<String>>,
    pub force: bool,
    pub force_build: bool,
    pub watch: bool,
}

/// Deploy tasks for the services of `module`.
pub fn deploy_tasks_for_module(project: &Project, module: &Arc<Module>, opts: &DeployOptions) -> Result<Vec<Task>> {
    project
        .services_for_modules(std::slice::from_ref(module), opts.services.as_deref())
        .into_iter()
        .map(|service| {
            DeployTask::new(
                project,
                service,
                opts.force,
                opts.force_build,
                opts.watch,
                Arc::clone(&opts.hot_reload_services),
            )
            .map(Task::Deploy)
        })
        .collect()
}

/// Test tasks for `module`, optionally only the test called `name`.
pub fn test_tasks_for_module(
    project: &Project,
    module: &Arc<Module>,
    name: Option<&str>,
    force: bool,
    force_build: bool,
) -> Result<Vec<Task>> {
    module
        .tests()
        .filter(|(test_name, _)| name.is_none_or(|n| n == *test_name))
        .map(|(test_name, _)| {
            TestTask::new(project, Arc::clone(module), test_name, force, force_build).map(Task::Test)
        })
        .collect()
}

/// Publish tasks for `modules`. Fails before any task exists when a module
/// has uncommitted changes and dirty publishes were not allowed.
pub fn publish_tasks(
    project: &Project,
    modules: &[Arc<Module>],
    force_build: bool,
    allow_dirty: bool,
) -> Result<Vec<Task>> {
    let mut tasks = Vec::with_capacity(modules.len());
    for module in modules {
        let version = project.module_version(&module.name)?;
        if version.is_dirty() && !allow_dirty {
            return Err(DevdagError::DirtyPublish {
                module: module.name.clone(),
            });
        }
        tasks.push(Task::Publish(PublishTask::new(
            project,
            Arc::clone(module),
            force_build,
        )?));
    }
    Ok(tasks)
}

/// Hot-reload tasks for the named modules.
pub fn tasks_for_hot_reload(project: &Project, module_names: &BTreeSet<String>) -> Result<Vec<Task>> {
    module_names
        .iter()
        .map(|name| {
            let module = project.module(name)?;
            HotReloadTask::new(project, module).map(Task::HotReload)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_env_names_are_upper_snake_case() {
        assert_eq!(service_version_env("api-gateway"), "DEVDAG_SERVICE_API_GATEWAY_VERSION");
        assert_eq!(service_version_env("db"), "DEVDAG_SERVICE_DB_VERSION");
    }
}
