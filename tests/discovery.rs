// tests/discovery.rs

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use devdag::dag::discover;
use devdag::errors::{DevdagError, TaskError};
use devdag::project::Project;
use devdag::tasks::{BuildTask, DeployTask, Task, TaskKey};
use devdag::vcs::VERSION_FILE_NAME;
use devdag_test_utils::{module_path, recording_context, ProjectBuilder};

fn build(project: &Project, name: &str) -> Task {
    Task::Build(BuildTask::new(project, project.module(name).unwrap(), false).unwrap())
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

fn keys<T: AsRef<str>>(items: &[T]) -> Vec<String> {
    items.iter().map(|k| k.as_ref().to_string()).collect()
}

#[tokio::test]
async fn emits_dependencies_before_dependents() {
    let project = ProjectBuilder::new()
        .module("c", |m| m)
        .module("b", |m| m.build_deps(&["c"]))
        .module("a", |m| m.build_deps(&["b"]))
        .module("d", |m| m.build_deps(&["c"]))
        .build();
    let (ctx, _) = recording_context(Arc::clone(&project));

    let found = discover(vec![build(&project, "a"), build(&project, "d")], &ctx, &HashSet::new())
        .await
        .unwrap();

    let order: Vec<&str> = found.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(order, vec!["build.c", "build.b", "build.a", "build.d"]);
    assert_eq!(found[1].deps, keys(&["build.c"]));
    assert_eq!(found[3].deps, keys(&["build.c"]));
}

#[tokio::test]
async fn known_keys_are_referenced_but_not_rediscovered() {
    let project = ProjectBuilder::new()
        .module("c", |m| m)
        .module("b", |m| m.build_deps(&["c"]))
        .module("a", |m| m.build_deps(&["b"]))
        .build();
    let (ctx, _) = recording_context(Arc::clone(&project));
    let known: HashSet<TaskKey> = HashSet::from(["build.b".to_string()]);

    let found = discover(vec![build(&project, "a")], &ctx, &known).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].key, "build.a");
    assert_eq!(found[0].deps, keys(&["build.b"]));
}

#[tokio::test]
async fn deploy_depends_on_runtime_services_and_its_own_push() {
    let project = ProjectBuilder::new()
        .module("db", |m| m.service("db", &[]))
        .module("api", |m| m.service("api", &["db"]))
        .build();
    let (ctx, _) = recording_context(Arc::clone(&project));

    let found = discover(vec![deploy(&project, "api")], &ctx, &HashSet::new()).await.unwrap();

    let api = found.iter().find(|d| d.key == "deploy.api").unwrap();
    assert_eq!(api.deps, keys(&["deploy.db", "push.api"]));
    assert_eq!(found.last().unwrap().key, "deploy.api");
    assert!(found.iter().any(|d| d.key == "build.db"));
}

#[tokio::test]
async fn cycles_report_the_full_path() {
    let project = ProjectBuilder::new()
        .module("mx", |m| m.service("x", &["y"]))
        .module("my", |m| m.service("y", &["z"]))
        .module("mz", |m| m.service("z", &["x"]))
        .build();
    let (ctx, _) = recording_context(Arc::clone(&project));

    let err = discover(vec![deploy(&project, "x")], &ctx, &HashSet::new())
        .await
        .unwrap_err();

    match err {
        DevdagError::DagCycle(msg) => assert_eq!(
            msg,
            "circular dependency detected: deploy.x -> deploy.y -> deploy.z -> deploy.x"
        ),
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_lookups_are_emitted_as_failed_tasks() {
    let builder = ProjectBuilder::new()
        .module("mx", |m| m.service("x", &["y"]))
        .module("my", |m| m.service("y", &[]))
        .module("solo", |m| m);
    builder
        .fs()
        .add_file(module_path("my").join(VERSION_FILE_NAME), "not json");
    let project = builder.build();
    let (ctx, _) = recording_context(Arc::clone(&project));

    let found = discover(
        vec![deploy(&project, "x"), build(&project, "solo")],
        &ctx,
        &HashSet::new(),
    )
    .await
    .unwrap();

    let x = found.iter().find(|d| d.key == "deploy.x").unwrap();
    assert!(x.deps.is_empty());
    assert!(matches!(x.error, Some(TaskError::Configuration(_))));
    assert!(found.iter().any(|d| d.key == "build.solo" && d.error.is_none()));
}
