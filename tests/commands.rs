// tests/commands.rs

use std::sync::Arc;

use devdag::cli::{BuildArgs, PublishArgs, RunArgs, TestArgs};
use devdag::commands::{
    build_command, handle_task_results, publish_command, run_command, test_command,
};
use devdag::dag::{ProcessResults, TaskResult};
use devdag::engine::{GraphOptions, TaskGraph};
use devdag::errors::{DevdagError, TaskError};
use devdag::process::WatchOptions;
use devdag::types::TaskType;
use devdag::vcs::TreeVersion;
use devdag_test_utils::{init_tracing, recording_context, with_timeout, ProjectBuilder};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn result(key: &str, error: Option<TaskError>) -> TaskResult {
    TaskResult {
        key: key.to_string(),
        task_type: TaskType::Build,
        description: format!("building {key}"),
        output: None,
        error,
        dependency_results: Arc::default(),
    }
}

fn results(items: Vec<TaskResult>) -> ProcessResults {
    ProcessResults {
        task_results: items.into_iter().map(|r| (r.key.clone(), r)).collect(),
        ..ProcessResults::default()
    }
}

#[test]
fn successful_results_are_ok() {
    let ok = results(vec![result("build.a", None)]);
    assert!(handle_task_results("build", &ok).is_ok());
}

#[test]
fn failures_are_counted_including_blocked_dependents() {
    let failed = results(vec![
        result("build.a", Some(TaskError::Execution("boom".into()))),
        result(
            "build.b",
            Some(TaskError::dependency_failed("build.a", &TaskError::Execution("boom".into()))),
        ),
        result("build.c", None),
    ]);

    let err = handle_task_results("build", &failed).unwrap_err();
    assert!(matches!(err, DevdagError::TasksFailed { count: 2, ref kind } if kind == "build"));
    assert_eq!(err.to_string(), "2 build task(s) failed!");
}

#[test]
fn interrupted_runs_are_errors() {
    let mut partial = results(vec![result("build.a", None)]);
    partial.interrupted = true;
    assert!(matches!(
        handle_task_results("build", &partial),
        Err(DevdagError::Interrupted)
    ));
}

#[tokio::test]
async fn build_command_builds_every_module_when_none_named() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .module("a", |m| m.build_deps(&["b"]))
        .module("b", |m| m)
        .build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());

    let results = with_timeout(build_command(&graph, &ctx, &BuildArgs::default(), WatchOptions::default())).await?;

    handle_task_results("build", &results)?;
    assert_eq!(actions.calls(), vec!["build.b", "build.a"]);
    Ok(())
}

#[tokio::test]
async fn build_command_rejects_unknown_modules() -> TestResult {
    let project = ProjectBuilder::new().module("a", |m| m).build();
    let (ctx, _actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());

    let args = BuildArgs {
        modules: vec!["ghost".to_string()],
        ..BuildArgs::default()
    };
    let err = build_command(&graph, &ctx, &args, WatchOptions::default()).await.unwrap_err();
    assert!(matches!(err, DevdagError::ModuleNotFound(ref name) if name == "ghost"));
    Ok(())
}

#[tokio::test]
async fn test_command_rejects_a_test_no_module_has() -> TestResult {
    let project = ProjectBuilder::new().module("api", |m| m.test("unit", &[])).build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());

    let args = TestArgs {
        name: Some("e2e".to_string()),
        ..TestArgs::default()
    };
    let err = test_command(&graph, &ctx, &args, WatchOptions::default()).await.unwrap_err();
    assert!(matches!(err, DevdagError::TestNotFound { ref test, .. } if test == "e2e"));
    assert!(actions.calls().is_empty());

    let args = TestArgs {
        name: Some("unit".to_string()),
        ..TestArgs::default()
    };
    let results = with_timeout(test_command(&graph, &ctx, &args, WatchOptions::default())).await?;
    assert!(results.is_success());
    assert_eq!(actions.count("test.api.unit"), 1);
    Ok(())
}

#[tokio::test]
async fn publish_command_stops_before_running_anything_on_dirty_modules() -> TestResult {
    let project = ProjectBuilder::new()
        .module("clean", |m| m)
        .module("dirty", |m| m)
        .tree("dirty", TreeVersion::dirty("abc", 1_700_000_000))
        .build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());

    let err = publish_command(&graph, &ctx, &PublishArgs::default()).await.unwrap_err();
    assert!(matches!(err, DevdagError::DirtyPublish { ref module } if module == "dirty"));
    assert!(err.is_configuration());
    assert!(actions.calls().is_empty());

    let args = PublishArgs {
        allow_dirty: true,
        ..PublishArgs::default()
    };
    let results = with_timeout(publish_command(&graph, &ctx, &args)).await?;
    assert!(results.is_success());
    assert_eq!(actions.count("publish.clean"), 1);
    assert_eq!(actions.count("publish.dirty"), 1);
    Ok(())
}

#[tokio::test]
async fn run_command_deploys_dependencies_then_runs_the_service() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .module("db", |m| m.service("db", &[]))
        .module("web", |m| m.service("web", &["db"]))
        .build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());

    let args = RunArgs {
        service: "web".to_string(),
    };
    let result = with_timeout(run_command(&graph, &ctx, &args)).await?;

    assert!(result.success);
    assert_eq!(result.output, "ran web\n");
    assert_eq!(actions.count("deploy.db"), 1);
    assert_eq!(actions.count("deploy.web"), 0);
    assert!(actions.position("build.web") < actions.position("run.web"));
    assert!(actions.position("deploy.db") < actions.position("run.web"));
    Ok(())
}

#[tokio::test]
async fn run_command_fails_when_a_dependency_fails() -> TestResult {
    let project = ProjectBuilder::new()
        .module("db", |m| m.service("db", &[]))
        .module("web", |m| m.service("web", &["db"]))
        .build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    actions.fail("deploy.db");
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());

    let args = RunArgs {
        service: "web".to_string(),
    };
    let err = with_timeout(run_command(&graph, &ctx, &args)).await.unwrap_err();
    assert!(matches!(err, DevdagError::TasksFailed { count: 1, .. }));
    assert_eq!(actions.count("run.web"), 0);
    Ok(())
}
