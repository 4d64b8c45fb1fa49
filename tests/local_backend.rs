// tests/local_backend.rs
#![cfg(unix)]

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use devdag::config::ServiceConfig;
use devdag::engine::{GraphOptions, TaskGraph};
use devdag::errors::TaskError;
use devdag::fs::RealFileSystem;
use devdag::plugin::{LocalActions, PluginActions};
use devdag::project::Project;
use devdag::tasks::{test_tasks_for_module, BuildTask, DeployTask, Task, TaskContext};
use devdag::types::ServiceState;
use devdag_test_utils::{init_tracing, with_timeout, ProjectBuilder};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn local_context(project: &Arc<Project>) -> (Arc<TaskContext>, Arc<LocalActions>) {
    let actions = Arc::new(LocalActions::new(project.state_dir(), Arc::new(RealFileSystem)));
    let ctx = Arc::new(TaskContext::new(Arc::clone(project), actions.clone()));
    (ctx, actions)
}

fn make_module_dirs(root: &Path, names: &[&str]) {
    for name in names {
        std::fs::create_dir_all(root.join(name)).unwrap();
    }
}

fn deploy(project: &Project, service: &str) -> Task {
    Task::Deploy(
        DeployTask::new(
            project,
            project.service(service).unwrap(),
            false,
            false,
            false,
            Arc::new(BTreeSet::new()),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn builds_are_recorded_and_skipped_when_current() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    make_module_dirs(dir.path(), &["api"]);
    let project = ProjectBuilder::new()
        .root(dir.path())
        .module("api", |m| m.build_command("echo built >> build.log"))
        .build();
    let (ctx, actions) = local_context(&project);
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    for _ in 0..2 {
        let task = Task::Build(BuildTask::new(&project, project.module("api")?, false)?);
        let results = with_timeout(graph.process_tasks(vec![task])).await?;
        assert!(results.is_success());
    }

    let log = std::fs::read_to_string(dir.path().join("api/build.log"))?;
    assert_eq!(log.lines().count(), 1);
    assert!(actions.build_record_path("api").is_file());
    Ok(())
}

#[tokio::test]
async fn failing_build_command_fails_the_task_with_its_output() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    make_module_dirs(dir.path(), &["api"]);
    let project = ProjectBuilder::new()
        .root(dir.path())
        .module("api", |m| m.build_command("echo compile error >&2; exit 3"))
        .build();
    let (ctx, actions) = local_context(&project);
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let task = Task::Build(BuildTask::new(&project, project.module("api")?, false)?);
    let results = with_timeout(graph.process_tasks(vec![task])).await?;

    match &results.task_results["build.api"].error {
        Some(TaskError::Execution(msg)) => assert!(msg.contains("compile error"), "{msg}"),
        other => panic!("expected an execution error, got {other:?}"),
    }
    assert!(!actions.build_record_path("api").exists());
    Ok(())
}

#[tokio::test]
async fn deploy_command_sees_the_module_version() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    make_module_dirs(dir.path(), &["api"]);
    let project = ProjectBuilder::new()
        .root(dir.path())
        .module("api", |m| {
            m.service_with(
                "api",
                ServiceConfig {
                    command: Some("echo $DEVDAG_MODULE_VERSION > deployed.txt".to_string()),
                    ..ServiceConfig::default()
                },
            )
        })
        .build();
    let (ctx, actions) = local_context(&project);
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let results = with_timeout(graph.process_tasks(vec![deploy(&project, "api")])).await?;
    assert!(results.is_success());

    let version = project.module_version("api")?.version_string;
    let deployed = std::fs::read_to_string(dir.path().join("api/deployed.txt"))?;
    assert_eq!(deployed.trim(), version);

    let status = actions.get_service_status(&*project.service("api")?).await?;
    assert_eq!(status.state, ServiceState::Ready);
    assert_eq!(status.version.as_deref(), Some(version.as_str()));
    Ok(())
}

#[tokio::test]
async fn long_lived_services_stay_up_until_shutdown() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    make_module_dirs(dir.path(), &["worker"]);
    let project = ProjectBuilder::new()
        .root(dir.path())
        .module("worker", |m| {
            m.service_with(
                "worker",
                ServiceConfig {
                    command: Some("echo listening; exec sleep 30".to_string()),
                    long_lived: true,
                    ready_on_stdout: Some("^listening$".to_string()),
                    ..ServiceConfig::default()
                },
            )
        })
        .build();
    let (ctx, actions) = local_context(&project);
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let results = with_timeout(graph.process_tasks(vec![deploy(&project, "worker")])).await?;
    assert!(results.is_success());

    let service = project.service("worker")?;
    assert_eq!(actions.get_service_status(&service).await?.state, ServiceState::Ready);

    actions.shutdown().await;
    assert_eq!(actions.get_service_status(&service).await?.state, ServiceState::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_results_are_recorded_per_version() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    make_module_dirs(dir.path(), &["api"]);
    let project = ProjectBuilder::new()
        .root(dir.path())
        .module("api", |m| {
            m.test_with("unit", "echo run >> tests.log", &[])
                .test_with("broken", "echo assertion failed; exit 1", &[])
        })
        .build();
    let (ctx, actions) = local_context(&project);
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());
    let api = project.module("api")?;

    let tasks = test_tasks_for_module(&project, &api, None, false, false)?;
    let first = with_timeout(graph.process_tasks(tasks)).await?;
    assert!(first.task_results["test.api.unit"].is_success());
    match &first.task_results["test.api.broken"].error {
        Some(TaskError::Execution(msg)) => {
            assert!(msg.contains("test api.broken failed"), "{msg}");
            assert!(msg.contains("assertion failed"), "{msg}");
        }
        other => panic!("expected an execution error, got {other:?}"),
    }

    let version = project.module_version("api")?;
    let recorded = actions.get_test_result(&api, "unit", &version).await?.unwrap();
    assert!(recorded.success);

    // Passed tests are skipped for the same version; failed ones re-run.
    let tasks = test_tasks_for_module(&project, &api, None, false, false)?;
    with_timeout(graph.process_tasks(tasks)).await?;
    let log = std::fs::read_to_string(dir.path().join("api/tests.log"))?;
    assert_eq!(log.lines().count(), 1);
    assert!(actions.test_record_path("api", "broken").is_file());
    Ok(())
}
