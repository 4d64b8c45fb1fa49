// src/plugin/mod.rs

//! Boundary to the backends that actually build, push, deploy and test.
//!
//! Tasks only ever talk to a backend through [`PluginActions`]. The crate
//! ships [`local::LocalActions`], which runs shell commands from the project
//! config; tests use a recording fake.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

use crate::config::TestConfig;
use crate::project::{Module, Service};
use crate::vcs::ModuleVersion;

pub mod local;
pub mod outputs;

pub use local::LocalActions;
pub use outputs::{
    BuildResult, BuildStatus, HotReloadResult, PublishResult, PushResult, RunResult,
    RuntimeContext, ServiceStatus, TestResult, MODULE_VERSION_ENV,
};

pub type ActionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Backend actions, one per task variant plus the status checks that drive
/// skip decisions.
pub trait PluginActions: Send + Sync + Debug {
    fn get_build_status<'a>(&'a self, module: &'a Module, version: &'a ModuleVersion) -> ActionFuture<'a, BuildStatus>;

    fn build<'a>(&'a self, module: &'a Module, version: &'a ModuleVersion) -> ActionFuture<'a, BuildResult>;

    /// Whether the backend can push this module. Without a handler a push
    /// is a no-op.
    fn supports_push(&self, _module: &Module) -> bool {
        false
    }

    fn push_module<'a>(&'a self, _module: &'a Module) -> ActionFuture<'a, PushResult> {
        Box::pin(async { Ok(PushResult::default()) })
    }

    fn get_service_status<'a>(&'a self, service: &'a Service) -> ActionFuture<'a, ServiceStatus>;

    fn deploy_service<'a>(
        &'a self,
        service: &'a Service,
        runtime_context: &'a RuntimeContext,
        force: bool,
    ) -> ActionFuture<'a, ServiceStatus>;

    fn run_service<'a>(&'a self, service: &'a Service, runtime_context: &'a RuntimeContext) -> ActionFuture<'a, RunResult>;

    fn test_module<'a>(
        &'a self,
        module: &'a Module,
        test_name: &'a str,
        test: &'a TestConfig,
        runtime_context: &'a RuntimeContext,
        version: &'a ModuleVersion,
    ) -> ActionFuture<'a, TestResult>;

    /// Previously recorded result of a test for a given version, if any.
    fn get_test_result<'a>(
        &'a self,
        module: &'a Module,
        test_name: &'a str,
        version: &'a ModuleVersion,
    ) -> ActionFuture<'a, Option<TestResult>>;

    fn publish_module<'a>(&'a self, module: &'a Module) -> ActionFuture<'a, PublishResult>;

    fn hot_reload<'a>(&'a self, module: &'a Module, runtime_context: &'a RuntimeContext) -> ActionFuture<'a, HotReloadResult>;
}
