// src/tasks/mod.rs

//! Units of work.
//!
//! [`Task`] is a closed set of variants. Each variant knows how to compute
//! the tasks it depends on and how to process itself; the graph only ever
//! sees the enum and its key.

use std::sync::Arc;

use serde::Serialize;

use crate::dag::TaskResults;
use crate::errors::Result;
use crate::plugin::{
    BuildResult, HotReloadResult, PluginActions, PublishResult, PushResult, ServiceStatus,
    TestResult,
};
use crate::project::Project;
use crate::types::TaskType;
use crate::vcs::ModuleVersion;

pub mod build;
pub mod deploy;
pub mod helpers;
pub mod hot_reload;
pub mod publish;
pub mod push;

pub use build::BuildTask;
pub use deploy::DeployTask;
pub use helpers::{
    deploy_tasks_for_module, prepare_runtime_context, publish_tasks, tasks_for_hot_reload,
    test_tasks_for_module, DeployOptions,
};
pub use hot_reload::HotReloadTask;
pub use publish::PublishTask;
pub use push::PushTask;
pub use test::TestTask;

/// Deduplication identity of a task: `<type>.<name>`.
pub type TaskKey = String;

/// Shared, read-only state every task body can reach.
#[derive(Debug)]
pub struct TaskContext {
    pub project: Arc<Project>,
    pub actions: Arc<dyn PluginActions>,
}

impl TaskContext {
    pub fn new(project: Arc<Project>, actions: Arc<dyn PluginActions>) -> Self {
        Self { project, actions }
    }
}

#[derive(Debug, Clone)]
pub enum Task {
    Build(BuildTask),
    Push(PushTask),
    Deploy(DeployTask),
    Test(TestTask),
    Publish(PublishTask),
    HotReload(HotReloadTask),
}

/// Success payload of a processed task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "result", rename_all = "kebab-case")]
pub enum TaskOutput {
    Build(BuildResult),
    Push(PushResult),
    Deploy(ServiceStatus),
    Test(TestResult),
    Publish(PublishResult),
    HotReload(HotReloadResult),
}

impl Task {
    pub fn task_type(&self) -> TaskType {
        match self {
            Task::Build(_) => TaskType::Build,
            Task::Push(_) => TaskType::Push,
            Task::Deploy(_) => TaskType::Deploy,
            Task::Test(_) => TaskType::Test,
            Task::Publish(_) => TaskType::Publish,
            Task::HotReload(_) => TaskType::HotReload,
        }
    }

    /// Name of the target: module, service, or `<module>.<test>`.
    pub fn name(&self) -> String {
        match self {
            Task::Build(t) => t.module.name.clone(),
            Task::Push(t) => t.module.name.clone(),
            Task::Deploy(t) => t.service.name.clone(),
            Task::Test(t) => t.name(),
            Task::Publish(t) => t.module.name.clone(),
            Task::HotReload(t) => t.module.name.clone(),
        }
    }

    pub fn key(&self) -> TaskKey {
        format!("{}.{}", self.task_type(), self.name())
    }

    pub fn version(&self) -> &ModuleVersion {
        match self {
            Task::Build(t) => &t.version,
            Task::Push(t) => &t.version,
            Task::Deploy(t) => &t.version,
            Task::Test(t) => &t.version,
            Task::Publish(t) => &t.version,
            Task::HotReload(t) => &t.version,
        }
    }

    /// Whether the task bypasses its staleness check.
    pub fn force(&self) -> bool {
        match self {
            Task::Build(t) => t.force,
            Task::Push(t) => t.force,
            Task::Deploy(t) => t.force,
            Task::Test(t) => t.force,
            Task::Publish(_) | Task::HotReload(_) => true,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Task::Build(t) => format!("building {}", t.module.name),
            Task::Push(t) => format!("pushing {}", t.module.name),
            Task::Deploy(t) => format!("deploying service {} (from module {})", t.service.name, t.service.module.name),
            Task::Test(t) => format!("running test {}", t.name()),
            Task::Publish(t) => format!("publishing {}", t.module.name),
            Task::HotReload(t) => format!("hot reloading {}", t.module.name),
        }
    }

    /// Tasks that must succeed before this one may run.
    pub async fn dependencies(&self, ctx: &TaskContext) -> Result<Vec<Task>> {
        match self {
            Task::Build(t) => t.dependencies(ctx).await,
            Task::Push(t) => t.dependencies(ctx).await,
            Task::Deploy(t) => t.dependencies(ctx).await,
            Task::Test(t) => t.dependencies(ctx).await,
            Task::Publish(t) => t.dependencies(ctx).await,
            Task::HotReload(_) => Ok(Vec::new()),
        }
    }

    /// Do the work. `dependency_results` holds the results of this task's
    /// direct dependencies.
    pub async fn process(&self, ctx: &TaskContext, dependency_results: &TaskResults) -> Result<TaskOutput> {
        tracing::debug!(
            task = %self.key(),
            dependencies = dependency_results.len(),
            "processing task"
        );
        match self {
            Task::Build(t) => t.process(ctx).await,
            Task::Push(t) => t.process(ctx).await,
            Task::Deploy(t) => t.process(ctx, dependency_results).await,
            Task::Test(t) => t.process(ctx, dependency_results).await,
            Task::Publish(t) => t.process(ctx).await,
            Task::HotReload(t) => t.process(ctx).await,
        }
    }
}
