// src/tasks/deploy.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::dag::TaskResults;
use crate::errors::Result;
use crate::project::{Project, Service};
use crate::tasks::helpers::prepare_runtime_context;
use crate::tasks::{PushTask, Task, TaskContext, TaskOutput};
use crate::types::ServiceState;
use crate::vcs::ModuleVersion;

#[derive(Debug, Clone)]
pub struct DeployTask {
    pub service: Arc<Service>,
    pub version: ModuleVersion,
    pub force: bool,
    pub force_build: bool,
    pub watch: bool,
    /// Services currently under hot reload. They are never redeployed as a
    /// dependency.
    pub hot_reload_services: Arc<BTreeSet<String>>,
}

impl DeployTask {
    pub fn new(
        project: &Project,
        service: Arc<Service>,
        force: bool,
        force_build: bool,
        watch: bool,
        hot_reload_services: Arc<BTreeSet<String>>,
    ) -> Result<Self> {
        let version = project.module_version(&service.module.name)?;
        Ok(Self {
            service,
            version,
            force,
            force_build,
            watch,
            hot_reload_services,
        })
    }

    pub(crate) async fn dependencies(&self, ctx: &TaskContext) -> Result<Vec<Task>> {
        let mut deps = Vec::new();

        for dep in ctx.project.services_named(self.service.dependencies())? {
            if self.hot_reload_services.contains(&dep.name) {
                debug!(service = %self.service.name, dependency = %dep.name, "dependency is hot reloading; not redeploying");
                continue;
            }
            deps.push(Task::Deploy(DeployTask::new(
                &ctx.project,
                dep,
                false,
                self.force_build,
                self.watch,
                Arc::clone(&self.hot_reload_services),
            )?));
        }

        deps.push(Task::Push(PushTask::new(
            &ctx.project,
            Arc::clone(&self.service.module),
            false,
            self.force_build,
        )?));

        Ok(deps)
    }

    pub(crate) async fn process(&self, ctx: &TaskContext, dependency_results: &TaskResults) -> Result<TaskOutput> {
        let status = ctx.actions.get_service_status(&self.service).await?;

        let current = status.version.as_deref() == Some(self.version.version_string.as_str());
        if !self.force && current && status.state == ServiceState::Ready {
            debug!(service = %self.service.name, version = %self.version.version_string, "service already deployed; skipping");
            return Ok(TaskOutput::Deploy(status));
        }

        let dependencies = ctx.project.services_named(self.service.dependencies())?;
        let runtime_context = prepare_runtime_context(&ctx.project, &self.version, &dependencies, dependency_results)?;

        let status = ctx
            .actions
            .deploy_service(&self.service, &runtime_context, self.force)
            .await?;
        Ok(TaskOutput::Deploy(status))
    }
}
