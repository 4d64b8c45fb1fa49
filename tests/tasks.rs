// tests/tasks.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use devdag::dag::{TaskResult, TaskResults};
use devdag::engine::{GraphOptions, TaskGraph};
use devdag::errors::DevdagError;
use devdag::plugin::{ServiceStatus, MODULE_VERSION_ENV};
use devdag::project::Project;
use devdag::tasks::{
    prepare_runtime_context, publish_tasks, tasks_for_hot_reload, test_tasks_for_module, BuildTask,
    DeployTask, PushTask, Task, TaskOutput,
};
use devdag::types::{ServiceState, TaskType};
use devdag::vcs::TreeVersion;
use devdag_test_utils::{init_tracing, recording_context, with_timeout, ProjectBuilder};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn deploy(project: &Project, service: &str, force: bool) -> Task {
    Task::Deploy(
        DeployTask::new(
            project,
            project.service(service).unwrap(),
            force,
            false,
            false,
            Arc::new(BTreeSet::new()),
        )
        .unwrap(),
    )
}

fn api_project() -> Arc<Project> {
    ProjectBuilder::new()
        .module("db", |m| m.service("db", &[]))
        .module("api", |m| m.service("api", &["db"]).test("unit", &["db"]))
        .build()
}

#[tokio::test]
async fn deploy_skips_a_current_service_unless_forced() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new().module("api", |m| m.service("api", &[])).build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let first = with_timeout(graph.process_tasks(vec![deploy(&project, "api", false)])).await?;
    assert!(first.is_success());
    assert_eq!(actions.calls(), vec!["build.api", "deploy.api"]);

    let second = with_timeout(graph.process_tasks(vec![deploy(&project, "api", false)])).await?;
    assert!(second.is_success());
    assert_eq!(actions.count("build.api"), 1);
    assert_eq!(actions.count("deploy.api"), 1);

    let forced = with_timeout(graph.process_tasks(vec![deploy(&project, "api", true)])).await?;
    assert!(forced.is_success());
    assert_eq!(actions.count("deploy.api"), 2);
    Ok(())
}

#[tokio::test]
async fn deploy_redeploys_a_service_that_is_not_ready() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new().module("api", |m| m.service("api", &[])).build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let version = project.module_version("api")?;
    actions.set_service_status(
        "api",
        ServiceStatus {
            state: ServiceState::Unhealthy,
            version: Some(version.version_string.clone()),
            detail: None,
        },
    );
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let results = with_timeout(graph.process_tasks(vec![deploy(&project, "api", false)])).await?;
    assert!(results.is_success());
    assert_eq!(actions.count("deploy.api"), 1);
    Ok(())
}

#[tokio::test]
async fn deploy_runs_runtime_dependencies_first_and_passes_their_versions() -> TestResult {
    init_tracing();
    let project = api_project();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let results = with_timeout(graph.process_tasks(vec![deploy(&project, "api", false)])).await?;
    assert!(results.is_success());

    assert!(actions.position("deploy.db") < actions.position("deploy.api"));
    assert!(actions.position("build.api") < actions.position("deploy.api"));

    let env = actions.deploy_context("api").unwrap().env;
    let api_version = project.module_version("api")?.version_string;
    let db_version = project.module_version("db")?.version_string;
    assert_eq!(env.get(MODULE_VERSION_ENV), Some(&api_version));
    assert_eq!(env.get("DEVDAG_SERVICE_DB_VERSION"), Some(&db_version));

    match &results.task_results["deploy.api"].output {
        Some(TaskOutput::Deploy(status)) => {
            assert_eq!(status.state, ServiceState::Ready);
            assert_eq!(status.version.as_deref(), Some(api_version.as_str()));
        }
        other => panic!("unexpected deploy output {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn hot_reloading_dependencies_are_not_redeployed() -> TestResult {
    init_tracing();
    let project = api_project();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let task = Task::Deploy(DeployTask::new(
        &project,
        project.service("api")?,
        false,
        false,
        true,
        Arc::new(BTreeSet::from(["db".to_string()])),
    )?);
    let results = with_timeout(graph.process_tasks(vec![task])).await?;

    assert!(results.is_success());
    assert_eq!(actions.count("deploy.db"), 0);
    assert_eq!(actions.count("deploy.api"), 1);
    Ok(())
}

#[tokio::test]
async fn push_only_calls_the_backend_when_it_has_a_handler() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .module("api", |m| m)
        .module("web", |m| m)
        .build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    actions.with_push("api");
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let tasks = ["api", "web"]
        .iter()
        .map(|name| {
            PushTask::new(&project, project.module(name).unwrap(), false, false).map(Task::Push)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let results = with_timeout(graph.process_tasks(tasks)).await?;

    assert!(results.is_success());
    assert_eq!(actions.count("push.api"), 1);
    assert_eq!(actions.count("push.web"), 0);
    assert!(actions.position("build.api") < actions.position("push.api"));
    Ok(())
}

#[tokio::test]
async fn forced_push_forces_its_build() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new().module("api", |m| m).build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let version = project.module_version("api")?;
    actions.mark_built("api", &version.version_string);
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let push = PushTask::new(&project, project.module("api")?, true, false)?;
    with_timeout(graph.process_tasks(vec![Task::Push(push)])).await?;
    assert_eq!(actions.count("build.api"), 1);

    let build = BuildTask::new(&project, project.module("api")?, false)?;
    with_timeout(graph.process_tasks(vec![Task::Build(build)])).await?;
    assert_eq!(actions.count("build.api"), 1);
    Ok(())
}

#[tokio::test]
async fn tests_wait_for_their_services_and_skip_when_already_passed() -> TestResult {
    init_tracing();
    let project = api_project();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());
    let api = project.module("api")?;

    let tasks = test_tasks_for_module(&project, &api, None, false, false)?;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].key(), "test.api.unit");

    let results = with_timeout(graph.process_tasks(tasks)).await?;
    assert!(results.is_success());
    assert!(actions.position("deploy.db") < actions.position("test.api.unit"));
    assert!(actions.position("build.api") < actions.position("test.api.unit"));

    let again = test_tasks_for_module(&project, &api, None, false, false)?;
    with_timeout(graph.process_tasks(again)).await?;
    assert_eq!(actions.count("test.api.unit"), 1);

    let forced = test_tasks_for_module(&project, &api, Some("unit"), true, false)?;
    with_timeout(graph.process_tasks(forced)).await?;
    assert_eq!(actions.count("test.api.unit"), 2);
    Ok(())
}

#[tokio::test]
async fn failing_test_fails_only_itself() -> TestResult {
    init_tracing();
    let project = api_project();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    actions.fail("test.api.unit");
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let tasks = test_tasks_for_module(&project, &project.module("api")?, None, false, false)?;
    let results = with_timeout(graph.process_tasks(tasks)).await?;

    assert_eq!(results.failure_count(), 1);
    assert!(!results.task_results["test.api.unit"].is_success());
    assert!(results.task_results["deploy.db"].is_success());
    Ok(())
}

#[test]
fn unknown_test_name_yields_no_tasks() {
    let project = api_project();
    let api = project.module("api").unwrap();
    let tasks = test_tasks_for_module(&project, &api, Some("e2e"), false, false).unwrap();
    assert!(tasks.is_empty());
}

#[test]
fn publish_refuses_dirty_modules_unless_allowed() {
    let project = ProjectBuilder::new()
        .module("lib", |m| m.publish("publish-lib"))
        .tree("lib", TreeVersion::dirty("abc1234", 1_700_000_000))
        .build();
    let lib = project.module("lib").unwrap();

    let err = publish_tasks(&project, std::slice::from_ref(&lib), false, false).unwrap_err();
    assert!(matches!(err, DevdagError::DirtyPublish { ref module } if module == "lib"));

    let tasks = publish_tasks(&project, std::slice::from_ref(&lib), false, true).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].key(), "publish.lib");
}

#[tokio::test]
async fn publish_builds_before_publishing() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new().module("lib", |m| m.publish("publish-lib")).build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(ctx, GraphOptions::default());

    let tasks = publish_tasks(&project, &project.modules(), false, false)?;
    let results = with_timeout(graph.process_tasks(tasks)).await?;

    assert!(results.is_success());
    assert_eq!(actions.calls(), vec!["build.lib", "publish.lib"]);
    Ok(())
}

#[tokio::test]
async fn hot_reload_tasks_run_without_dependencies() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .module("web", |m| m.hot_reload("sync-assets").service("web", &[]))
        .build();
    let (ctx, actions) = recording_context(Arc::clone(&project));

    let names = project.hot_reload_module_names(&["web".to_string()])?;
    let tasks = tasks_for_hot_reload(&project, &names)?;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].key(), "hot-reload.web");
    assert!(tasks[0].dependencies(&ctx).await?.is_empty());

    let output = tasks[0].process(&ctx, &TaskResults::new()).await?;
    assert!(matches!(output, TaskOutput::HotReload(_)));
    assert_eq!(actions.calls(), vec!["hot-reload.web"]);
    Ok(())
}

#[test]
fn hot_reload_requires_a_reload_command() {
    let project = ProjectBuilder::new().module("api", |m| m.service("api", &[])).build();
    let err = project.hot_reload_module_names(&["api".to_string()]).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn runtime_context_prefers_versions_reported_by_dependency_deploys() -> TestResult {
    let project = api_project();
    let api = project.module_version("api")?;
    let db = project.service("db")?;

    let mut results = TaskResults::new();
    results.insert(
        "deploy.db".to_string(),
        TaskResult {
            key: "deploy.db".to_string(),
            task_type: TaskType::Deploy,
            description: "deploying service db".to_string(),
            output: Some(TaskOutput::Deploy(ServiceStatus::ready("db-running"))),
            error: None,
            dependency_results: Arc::default(),
        },
    );

    let with_deploy = prepare_runtime_context(&project, &api, &[Arc::clone(&db)], &results)?;
    assert_eq!(with_deploy.env["DEVDAG_SERVICE_DB_VERSION"], "db-running");

    let without = prepare_runtime_context(&project, &api, &[db], &TaskResults::new())?;
    assert_eq!(
        without.env["DEVDAG_SERVICE_DB_VERSION"],
        project.module_version("db")?.version_string
    );
    Ok(())
}
