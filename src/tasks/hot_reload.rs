// src/tasks/hot_reload.rs

use std::sync::Arc;

use crate::dag::TaskResults;
use crate::errors::Result;
use crate::project::{Module, Project};
use crate::tasks::helpers::prepare_runtime_context;
use crate::tasks::{TaskContext, TaskOutput};
use crate::vcs::ModuleVersion;

/// Push changed sources into already running services of a module.
#[derive(Debug, Clone)]
pub struct HotReloadTask {
    pub module: Arc<Module>,
    pub version: ModuleVersion,
}

impl HotReloadTask {
    pub fn new(project: &Project, module: Arc<Module>) -> Result<Self> {
        let version = project.module_version(&module.name)?;
        Ok(Self { module, version })
    }

    pub(crate) async fn process(&self, ctx: &TaskContext) -> Result<TaskOutput> {
        let runtime_context = prepare_runtime_context(&ctx.project, &self.version, &[], &TaskResults::new())?;
        let result = ctx
            .actions
            .hot_reload(&self.module, &runtime_context)
            .await?;
        Ok(TaskOutput::HotReload(result))
    }
}
