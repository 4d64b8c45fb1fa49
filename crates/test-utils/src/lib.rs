pub mod builders;
pub mod fake_executor;
pub mod fake_vcs;
pub mod recording_actions;

use std::sync::{Arc, Once};

use devdag::project::Project;
use devdag::tasks::TaskContext;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{module_path, ModuleBuilder, ProjectBuilder, PROJECT_ROOT};
pub use fake_executor::FakeExecutor;
pub use fake_vcs::{FakeVcs, DEFAULT_COMMIT};
pub use recording_actions::RecordingActions;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `DEVDAG_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(devdag::logging::LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .try_init();
    });
}

/// Task context over a project and a recording backend.
pub fn recording_context(project: Arc<Project>) -> (Arc<TaskContext>, Arc<RecordingActions>) {
    let actions = Arc::new(RecordingActions::new());
    let ctx = Arc::new(TaskContext::new(project, actions.clone()));
    (ctx, actions)
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}
