use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::bail;
use devdag::config::TestConfig;
use devdag::plugin::{
    ActionFuture, BuildResult, BuildStatus, HotReloadResult, PluginActions, PublishResult,
    PushResult, RunResult, RuntimeContext, ServiceStatus, TestResult,
};
use devdag::project::{Module, Service};
use devdag::vcs::ModuleVersion;

#[derive(Debug, Default)]
struct State {
    calls: Vec<String>,
    finished: Vec<String>,
    failures: HashSet<String>,
    delays: HashMap<String, Duration>,
    push_modules: HashSet<String>,
    /// module -> version string of the last build
    built: HashMap<String, String>,
    services: HashMap<String, ServiceStatus>,
    tests: HashMap<(String, String, String), TestResult>,
    deploy_contexts: HashMap<String, RuntimeContext>,
}

/// Plugin backend that records every action instead of running anything.
///
/// Actions are recorded under the same key as the task that calls them
/// (`build.api`, `deploy.web`, `test.api.unit`, ...). Status checks are not
/// recorded. Builds, deploys and test runs update the state the matching
/// status checks read, so a second run sees the first run's work.
#[derive(Debug, Default)]
pub struct RecordingActions {
    state: Mutex<State>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the action recorded under `key` fail from now on.
    pub fn fail(&self, key: &str) {
        self.lock().failures.insert(key.to_string());
    }

    pub fn clear_failure(&self, key: &str) {
        self.lock().failures.remove(key);
    }

    /// Make the action recorded under `key` take `delay`.
    pub fn delay(&self, key: &str, delay: Duration) {
        self.lock().delays.insert(key.to_string(), delay);
    }

    /// Report a push handler for `module`.
    pub fn with_push(&self, module: &str) {
        self.lock().push_modules.insert(module.to_string());
    }

    pub fn mark_built(&self, module: &str, version: &str) {
        self.lock().built.insert(module.to_string(), version.to_string());
    }

    pub fn set_service_status(&self, service: &str, status: ServiceStatus) {
        self.lock().services.insert(service.to_string(), status);
    }

    /// Action keys in the order actions started.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Action keys in the order actions finished.
    pub fn finished(&self) -> Vec<String> {
        self.lock().finished.clone()
    }

    pub fn count(&self, key: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == key).count()
    }

    /// Position of `key` in start order.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.lock().calls.iter().position(|c| c == key)
    }

    /// Runtime context the last deploy of `service` received.
    pub fn deploy_context(&self, service: &str) -> Option<RuntimeContext> {
        self.lock().deploy_contexts.get(service).cloned()
    }

    /// Highest number of actions that were in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        let mut state = self.lock();
        state.calls.clear();
        state.finished.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn perform(&self, key: String) -> anyhow::Result<()> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(key.clone());
            state.delays.get(&key).copied()
        };

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.lock();
        state.finished.push(key.clone());
        if state.failures.contains(&key) {
            bail!("{key} failed");
        }
        Ok(())
    }
}

impl PluginActions for RecordingActions {
    fn get_build_status<'a>(&'a self, module: &'a Module, version: &'a ModuleVersion) -> ActionFuture<'a, BuildStatus> {
        Box::pin(async move {
            let ready = self.lock().built.get(&module.name) == Some(&version.version_string);
            Ok(BuildStatus { ready })
        })
    }

    fn build<'a>(&'a self, module: &'a Module, version: &'a ModuleVersion) -> ActionFuture<'a, BuildResult> {
        Box::pin(async move {
            self.perform(format!("build.{}", module.name)).await?;
            self.mark_built(&module.name, &version.version_string);
            Ok(BuildResult {
                fresh: true,
                build_log: None,
            })
        })
    }

    fn supports_push(&self, module: &Module) -> bool {
        self.lock().push_modules.contains(&module.name)
    }

    fn push_module<'a>(&'a self, module: &'a Module) -> ActionFuture<'a, PushResult> {
        Box::pin(async move {
            self.perform(format!("push.{}", module.name)).await?;
            Ok(PushResult {
                pushed: true,
                message: None,
            })
        })
    }

    fn get_service_status<'a>(&'a self, service: &'a Service) -> ActionFuture<'a, ServiceStatus> {
        Box::pin(async move { Ok(self.lock().services.get(&service.name).cloned().unwrap_or_default()) })
    }

    fn deploy_service<'a>(
        &'a self,
        service: &'a Service,
        runtime_context: &'a RuntimeContext,
        _force: bool,
    ) -> ActionFuture<'a, ServiceStatus> {
        Box::pin(async move {
            self.perform(format!("deploy.{}", service.name)).await?;
            let status = ServiceStatus::ready(runtime_context.module_version().unwrap_or_default());
            let mut state = self.lock();
            state.services.insert(service.name.clone(), status.clone());
            state.deploy_contexts.insert(service.name.clone(), runtime_context.clone());
            Ok(status)
        })
    }

    fn run_service<'a>(&'a self, service: &'a Service, _runtime_context: &'a RuntimeContext) -> ActionFuture<'a, RunResult> {
        Box::pin(async move {
            self.perform(format!("run.{}", service.name)).await?;
            Ok(RunResult {
                success: true,
                output: format!("ran {}\n", service.name),
            })
        })
    }

    fn test_module<'a>(
        &'a self,
        module: &'a Module,
        test_name: &'a str,
        _test: &'a TestConfig,
        _runtime_context: &'a RuntimeContext,
        version: &'a ModuleVersion,
    ) -> ActionFuture<'a, TestResult> {
        Box::pin(async move {
            self.perform(format!("test.{}.{}", module.name, test_name)).await?;
            let result = TestResult {
                module: module.name.clone(),
                test_name: test_name.to_string(),
                version: version.version_string.clone(),
                success: true,
                output: String::new(),
            };
            self.lock().tests.insert(
                (module.name.clone(), test_name.to_string(), version.version_string.clone()),
                result.clone(),
            );
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
            let key = (module.name.clone(), test_name.to_string(), version.version_string.clone());
            Ok(self.lock().tests.get(&key).cloned())
        })
    }

    fn publish_module<'a>(&'a self, module: &'a Module) -> ActionFuture<'a, PublishResult> {
        Box::pin(async move {
            self.perform(format!("publish.{}", module.name)).await?;
            Ok(PublishResult {
                published: true,
                message: None,
            })
        })
    }

    fn hot_reload<'a>(&'a self, module: &'a Module, _runtime_context: &'a RuntimeContext) -> ActionFuture<'a, HotReloadResult> {
        Box::pin(async move {
            self.perform(format!("hot-reload.{}", module.name)).await?;
            Ok(HotReloadResult::default())
        })
    }
}
