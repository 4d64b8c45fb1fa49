// src/tasks/push.rs

use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::plugin::PushResult;
use crate::project::{Module, Project};
use crate::tasks::{BuildTask, Task, TaskContext, TaskOutput};
use crate::vcs::ModuleVersion;

#[derive(Debug, Clone)]
pub struct PushTask {
    pub module: Arc<Module>,
    pub version: ModuleVersion,
    pub force: bool,
    pub force_build: bool,
}

impl PushTask {
    pub fn new(project: &Project, module: Arc<Module>, force: bool, force_build: bool) -> Result<Self> {
        let version = project.module_version(&module.name)?;
        Ok(Self {
            module,
            version,
            force,
            force_build,
        })
    }

    pub(crate) async fn dependencies(&self, ctx: &TaskContext) -> Result<Vec<Task>> {
        let build = BuildTask::new(
            &ctx.project,
            Arc::clone(&self.module),
            self.force || self.force_build,
        )?;
        Ok(vec![Task::Build(build)])
    }

    pub(crate) async fn process(&self, ctx: &TaskContext) -> Result<TaskOutput> {
        if !ctx.actions.supports_push(&self.module) {
            debug!(module = %self.module.name, "no push handler; nothing to push");
            return Ok(TaskOutput::Push(PushResult::default()));
        }

        let result = ctx.actions.push_module(&self.module).await?;
        Ok(TaskOutput::Push(result))
    }
}
