// src/plugin/local.rs

//! Backend that runs the shell commands declared in the project config.
//!
//! Build and test records are JSON files under the project state dir, so
//! skip decisions survive across invocations. Service state only lives as
//! long as the process.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context};
use tracing::{debug, info};

use crate::config::TestConfig;
use crate::exec::command::{run_checked, run_command, CommandSpec};
use crate::exec::long_lived::{spawn_long_lived, LongLivedProcess, ReadyCondition};
use crate::fs::FileSystem;
use crate::plugin::outputs::{
    BuildResult, BuildStatus, HotReloadResult, PublishResult, PushResult, RunResult,
    RuntimeContext, ServiceStatus, TestResult, MODULE_VERSION_ENV,
};
use crate::plugin::{ActionFuture, PluginActions};
use crate::project::{Module, Service};
use crate::types::ServiceState;
use crate::vcs::version_file::{read_module_version_file, write_module_version_file};
use crate::vcs::ModuleVersion;

#[derive(Debug)]
pub struct LocalActions {
    state_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    statuses: Mutex<HashMap<String, ServiceStatus>>,
    processes: tokio::sync::Mutex<HashMap<String, LongLivedProcess>>,
}

impl LocalActions {
    pub fn new(state_dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            state_dir: state_dir.into(),
            fs,
            statuses: Mutex::new(HashMap::new()),
            processes: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn build_record_path(&self, module: &str) -> PathBuf {
        self.state_dir.join("build").join(format!("{module}.json"))
    }

    pub fn test_record_path(&self, module: &str, test: &str) -> PathBuf {
        self.state_dir.join("test").join(format!("{module}.{test}.json"))
    }

    /// Stop every long-lived service started by this backend.
    pub async fn shutdown(&self) {
        let mut processes = self.processes.lock().await;
        for (name, process) in processes.drain() {
            debug!(service = %name, "stopping service on shutdown");
            process.stop().await;
        }
    }

    fn lock_statuses(&self) -> MutexGuard<'_, HashMap<String, ServiceStatus>> {
        self.statuses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn spec(label: String, command: &str, cwd: &Path, env: &BTreeMap<String, String>) -> CommandSpec {
        CommandSpec::new(label, command, cwd).with_env(env)
    }

    fn version_env(version: &ModuleVersion) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(MODULE_VERSION_ENV.to_string(), version.version_string.clone());
        env
    }
}

impl PluginActions for LocalActions {
    fn get_build_status<'a>(&'a self, module: &'a Module, version: &'a ModuleVersion) -> ActionFuture<'a, BuildStatus> {
        Box::pin(async move {
            let record = read_module_version_file(self.fs.as_ref(), &self.build_record_path(&module.name))?;
            let ready = record.is_some_and(|built| built.version_string == version.version_string);
            Ok(BuildStatus { ready })
        })
    }

    fn build<'a>(&'a self, module: &'a Module, version: &'a ModuleVersion) -> ActionFuture<'a, BuildResult> {
        Box::pin(async move {
            let build_log = match module.config.build.command.as_deref() {
                Some(command) => {
                    let spec = Self::spec(format!("build.{}", module.name), command, &module.path, &Self::version_env(version));
                    Some(run_checked(&spec).await?.stdout)
                }
                None => None,
            };

            write_module_version_file(self.fs.as_ref(), &self.build_record_path(&module.name), version)
                .with_context(|| format!("recording build of module '{}'", module.name))?;

            Ok(BuildResult {
                fresh: true,
                build_log,
            })
        })
    }

    fn supports_push(&self, module: &Module) -> bool {
        module.config.push.is_some()
    }

    fn push_module<'a>(&'a self, module: &'a Module) -> ActionFuture<'a, PushResult> {
        Box::pin(async move {
            let Some(command) = module.config.push.as_deref() else {
                return Ok(PushResult::default());
            };
            let spec = Self::spec(format!("push.{}", module.name), command, &module.path, &BTreeMap::new());
            let output = run_checked(&spec).await?;
            let message = Some(output.stdout.trim().to_string()).filter(|m| !m.is_empty());
            Ok(PushResult { pushed: true, message })
        })
    }

    fn get_service_status<'a>(&'a self, service: &'a Service) -> ActionFuture<'a, ServiceStatus> {
        Box::pin(async move {
            let mut status = self
                .lock_statuses()
                .get(&service.name)
                .cloned()
                .unwrap_or_default();

            if service.config.long_lived && status.state == ServiceState::Ready {
                let mut processes = self.processes.lock().await;
                let alive = processes
                    .get_mut(&service.name)
                    .is_some_and(|p| p.is_running());
                if !alive {
                    status.state = ServiceState::Stopped;
                }
            }

            Ok(status)
        })
    }

    fn deploy_service<'a>(
        &'a self,
        service: &'a Service,
        runtime_context: &'a RuntimeContext,
        force: bool,
    ) -> ActionFuture<'a, ServiceStatus> {
        Box::pin(async move {
            let label = format!("deploy.{}", service.name);
            info!(service = %service.name, force, "deploying service");

            if let Some(command) = service.config.command.as_deref() {
                let spec = Self::spec(label, command, &service.module.path, &runtime_context.env);

                if service.config.long_lived {
                    let ready = ReadyCondition::parse(
                        service.config.ready_on_stdout.as_deref(),
                        service.config.ready_after.as_deref(),
                    )?;

                    let mut processes = self.processes.lock().await;
                    if let Some(previous) = processes.remove(&service.name) {
                        previous.stop().await;
                    }
                    let process = spawn_long_lived(&spec, &ready).await?;
                    processes.insert(service.name.clone(), process);
                } else {
                    run_checked(&spec).await?;
                }
            }

            let version = runtime_context
                .module_version()
                .ok_or_else(|| anyhow!("runtime context for '{}' has no module version", service.name))?;
            let status = ServiceStatus::ready(version);
            self.lock_statuses()
                .insert(service.name.clone(), status.clone());
            Ok(status)
        })
    }

    fn run_service<'a>(&'a self, service: &'a Service, runtime_context: &'a RuntimeContext) -> ActionFuture<'a, RunResult> {
        Box::pin(async move {
            let command = service
                .config
                .command
                .as_deref()
                .ok_or_else(|| anyhow!("service '{}' has no command to run", service.name))?;
            let spec = Self::spec(format!("run.{}", service.name), command, &service.module.path, &runtime_context.env);
            let output = run_command(&spec).await?;
            Ok(RunResult {
                success: output.success(),
                output: output.stdout,
            })
        })
    }

    fn test_module<'a>(
        &'a self,
        module: &'a Module,
        test_name: &'a str,
        test: &'a TestConfig,
        runtime_context: &'a RuntimeContext,
        version: &'a ModuleVersion,
    ) -> ActionFuture<'a, TestResult> {
        Box::pin(async move {
            let spec = Self::spec(
                format!("test.{}.{}", module.name, test_name),
                &test.command,
                &module.path,
                &runtime_context.env,
            );
            let output = run_command(&spec).await?;

            let result = TestResult {
                module: module.name.clone(),
                test_name: test_name.to_string(),
                version: version.version_string.clone(),
                success: output.success(),
                output: format!("{}{}", output.stdout, output.stderr),
            };

            let json = serde_json::to_vec(&result)?;
            self.fs
                .write(&self.test_record_path(&module.name, test_name), &json)?;
            Ok(result)
        })
    }

    fn get_test_result<'a>(
        &'a self,
        module: &'a Module,
        test_name: &'a str,
        version: &'a ModuleVersion,
    ) -> ActionFuture<'a, Option<TestResult>> {
        Box::pin(async move {
            let path = self.test_record_path(&module.name, test_name);
            if !self.fs.is_file(&path) {
                return Ok(None);
            }
            let contents = self.fs.read_to_string(&path)?;
            let result: TestResult = serde_json::from_str(&contents)
                .with_context(|| format!("parsing test record {:?}", path))?;
            Ok(Some(result).filter(|r| r.version == version.version_string))
        })
    }

    fn publish_module<'a>(&'a self, module: &'a Module) -> ActionFuture<'a, PublishResult> {
        Box::pin(async move {
            let Some(command) = module.config.publish.as_deref() else {
                return Ok(PublishResult {
                    published: false,
                    message: Some(format!("module '{}' has no publish command", module.name)),
                });
            };
            let spec = Self::spec(format!("publish.{}", module.name), command, &module.path, &BTreeMap::new());
            let output = run_checked(&spec).await?;
            Ok(PublishResult {
                published: true,
                message: Some(output.stdout.trim().to_string()).filter(|m| !m.is_empty()),
            })
        })
    }

    fn hot_reload<'a>(&'a self, module: &'a Module, runtime_context: &'a RuntimeContext) -> ActionFuture<'a, HotReloadResult> {
        Box::pin(async move {
            let command = module
                .config
                .hot_reload
                .as_deref()
                .ok_or_else(|| anyhow!("module '{}' has no hot_reload command", module.name))?;
            let spec = Self::spec(format!("hot-reload.{}", module.name), command, &module.path, &runtime_context.env);
            let output = run_checked(&spec).await?;
            Ok(HotReloadResult {
                output: Some(output.stdout),
            })
        })
    }
}
