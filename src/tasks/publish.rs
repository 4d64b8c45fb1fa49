// src/tasks/publish.rs

use std::sync::Arc;

use crate::errors::Result;
use crate::project::{Module, Project};
use crate::tasks::{BuildTask, Task, TaskContext, TaskOutput};
use crate::vcs::ModuleVersion;

/// Publish a module's build output. The dirty-tree check happens before
/// the task is created, see [`crate::tasks::publish_tasks`].
#[derive(Debug, Clone)]
pub struct PublishTask {
    pub module: Arc<Module>,
    pub version: ModuleVersion,
    pub force_build: bool,
}

impl PublishTask {
    pub fn new(project: &Project, module: Arc<Module>, force_build: bool) -> Result<Self> {
        let version = project.module_version(&module.name)?;
        Ok(Self {
            module,
            version,
            force_build,
        })
    }

    pub(crate) async fn dependencies(&self, ctx: &TaskContext) -> Result<Vec<Task>> {
        let build = BuildTask::new(&ctx.project, Arc::clone(&self.module), self.force_build)?;
        Ok(vec![Task::Build(build)])
    }

    pub(crate) async fn process(&self, ctx: &TaskContext) -> Result<TaskOutput> {
        let result = ctx.actions.publish_module(&self.module).await?;
        Ok(TaskOutput::Publish(result))
    }
}
