// tests/watch_loop.rs

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use devdag::cli::DeployArgs;
use devdag::commands::deploy_command;
use devdag::engine::{GraphOptions, TaskGraph};
use devdag::errors::Result;
use devdag::process::{process_modules, WatchOptions};
use devdag::project::{Module, Project};
use devdag::tasks::{BuildTask, Task};
use devdag::watch::WatchEvent;
use devdag_test_utils::{init_tracing, recording_context, with_timeout, ProjectBuilder, RecordingActions};

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn rebuild(project: &Project, module: &Arc<Module>) -> Result<Vec<Task>> {
    Ok(vec![Task::Build(BuildTask::new(project, Arc::clone(module), true)?)])
}

/// lib <- app, plus an unrelated module.
fn project() -> Arc<Project> {
    ProjectBuilder::new()
        .module("lib", |m| m)
        .module("app", |m| m.build_deps(&["lib"]))
        .module("other", |m| m)
        .build()
}

async fn wait_for_count(actions: &RecordingActions, key: &str, expected: usize) {
    with_timeout(async {
        while actions.count(key) < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

fn watching(events: mpsc::Receiver<WatchEvent>) -> WatchOptions {
    WatchOptions {
        events: Some(events),
        ..WatchOptions::default()
    }
}

#[tokio::test]
async fn without_events_the_loop_returns_after_the_first_run() -> TestResult {
    init_tracing();
    let project = project();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());

    let results = with_timeout(process_modules(
        &graph,
        &ctx,
        &project.modules(),
        &rebuild,
        WatchOptions::default(),
    ))
    .await?;

    assert!(results.is_success());
    assert!(!results.restart_required);
    assert_eq!(results.task_results.len(), 3);
    assert_eq!(actions.count("build.lib"), 1);
    Ok(())
}

#[tokio::test]
async fn change_resubmits_the_module_and_its_dependants() -> TestResult {
    init_tracing();
    let project = project();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());
    let (tx, rx) = mpsc::channel(8);

    let watch_loop = {
        let graph = graph.clone();
        let ctx = Arc::clone(&ctx);
        let modules = project.modules();
        tokio::spawn(async move { process_modules(&graph, &ctx, &modules, &rebuild, watching(rx)).await })
    };

    wait_for_count(&actions, "build.app", 1).await;
    // Keep the rebuilt lib running until app's tasks have joined the run.
    actions.delay("build.lib", Duration::from_millis(100));
    tx.send(WatchEvent::ModuleChanged("lib".to_string())).await?;
    wait_for_count(&actions, "build.app", 2).await;
    assert_eq!(actions.count("build.lib"), 2);
    assert_eq!(actions.count("build.other"), 1);

    tx.send(WatchEvent::Shutdown).await?;
    let results = with_timeout(watch_loop).await??;
    // The loop reports the initial run.
    assert_eq!(results.task_results.len(), 3);
    assert!(results.is_success());
    Ok(())
}

#[tokio::test]
async fn changes_outside_the_requested_modules_are_ignored() -> TestResult {
    init_tracing();
    let project = project();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());
    let (tx, rx) = mpsc::channel(8);

    let app = vec![project.module("app")?];
    tx.send(WatchEvent::ModuleChanged("other".to_string())).await?;
    tx.send(WatchEvent::ModuleChanged("nope".to_string())).await?;
    tx.send(WatchEvent::Shutdown).await?;

    let results = with_timeout(process_modules(&graph, &ctx, &app, &rebuild, watching(rx))).await?;

    assert!(results.is_success());
    assert_eq!(actions.count("build.other"), 0);
    assert_eq!(actions.count("build.app"), 1);
    Ok(())
}

#[tokio::test]
async fn config_change_asks_for_a_restart() -> TestResult {
    init_tracing();
    let project = project();
    let (ctx, _actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());
    let (tx, rx) = mpsc::channel(8);

    tx.send(WatchEvent::ConfigChanged).await?;
    let results = with_timeout(process_modules(&graph, &ctx, &project.modules(), &rebuild, watching(rx))).await?;

    assert!(results.restart_required);
    assert!(results.is_success());
    Ok(())
}

#[tokio::test]
async fn closed_event_stream_ends_the_loop() -> TestResult {
    init_tracing();
    let project = project();
    let (ctx, _actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());
    let (tx, rx) = mpsc::channel::<WatchEvent>(8);
    drop(tx);

    let results = with_timeout(process_modules(&graph, &ctx, &project.modules(), &rebuild, watching(rx))).await?;
    assert!(!results.restart_required);
    Ok(())
}

#[tokio::test]
async fn hot_reload_modules_are_reloaded_instead_of_redeployed() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .module("db", |m| m.service("db", &[]))
        .module("web", |m| m.hot_reload("sync-assets").service("web", &["db"]))
        .build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());
    let (tx, rx) = mpsc::channel(8);

    let args = DeployArgs {
        hot_reload: vec!["web".to_string()],
        ..DeployArgs::default()
    };

    tx.send(WatchEvent::ModuleChanged("web".to_string())).await?;
    tx.send(WatchEvent::Shutdown).await?;
    let results = with_timeout(deploy_command(&graph, &ctx, &args, watching(rx))).await?;

    assert!(results.is_success());
    assert_eq!(actions.count("deploy.web"), 1);
    assert_eq!(actions.count("deploy.db"), 1);
    assert_eq!(actions.count("hot-reload.web"), 1);
    assert!(actions.position("deploy.web") < actions.position("hot-reload.web"));
    Ok(())
}

#[tokio::test]
async fn deploy_redeploys_dependants_of_a_changed_module() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .module("db", |m| m.service("db", &[]))
        .module("web", |m| m.service("web", &["db"]))
        .build();
    let (ctx, actions) = recording_context(Arc::clone(&project));
    let (graph, _runtime) = TaskGraph::spawn(Arc::clone(&ctx), GraphOptions::default());
    let (tx, rx) = mpsc::channel(8);

    let run = {
        let graph = graph.clone();
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            deploy_command(&graph, &ctx, &DeployArgs::default(), watching(rx)).await
        })
    };

    wait_for_count(&actions, "deploy.web", 1).await;
    tx.send(WatchEvent::ModuleChanged("db".to_string())).await?;
    wait_for_count(&actions, "deploy.web", 2).await;
    wait_for_count(&actions, "deploy.db", 2).await;

    tx.send(WatchEvent::Shutdown).await?;
    let results = with_timeout(run).await??;
    assert!(results.is_success());
    assert_eq!(
        results.task_results.keys().filter(|k| k.starts_with("deploy.")).cloned().collect::<BTreeSet<_>>(),
        BTreeSet::from(["deploy.db".to_string(), "deploy.web".to_string()])
    );
    Ok(())
}
