// src/tasks/build.rs

use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::plugin::BuildResult;
use crate::project::{Module, Project};
use crate::tasks::{Task, TaskContext, TaskOutput};
use crate::vcs::ModuleVersion;

/// Build one module, after the modules it lists as build dependencies.
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub module: Arc<Module>,
    pub version: ModuleVersion,
    pub force: bool,
}

impl BuildTask {
    pub fn new(project: &Project, module: Arc<Module>, force: bool) -> Result<Self> {
        let version = project.module_version(&module.name)?;
        Ok(Self {
            module,
            version,
            force,
        })
    }

    pub(crate) async fn dependencies(&self, ctx: &TaskContext) -> Result<Vec<Task>> {
        ctx.project
            .build_dependencies(&self.module)?
            .into_iter()
            .map(|dep| BuildTask::new(&ctx.project, dep, self.force).map(Task::Build))
            .collect()
    }

    pub(crate) async fn process(&self, ctx: &TaskContext) -> Result<TaskOutput> {
        if !self.force {
            let status = ctx
                .actions
                .get_build_status(&self.module, &self.version)
                .await?;
            if status.ready {
                debug!(module = %self.module.name, version = %self.version.version_string, "build output is current; skipping");
                return Ok(TaskOutput::Build(BuildResult {
                    fresh: false,
                    build_log: None,
                }));
            }
        }

        let result = ctx.actions.build(&self.module, &self.version).await?;
        Ok(TaskOutput::Build(result))
    }
}
