// src/lib.rs

pub mod cli;
pub mod commands;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod plugin;
pub mod process;
pub mod project;
pub mod tasks;
pub mod types;
pub mod vcs;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::commands::{
    build_command, deploy_command, handle_task_results, publish_command, run_command, test_command,
};
use crate::config::{config_root_dir, load_and_validate};
use crate::engine::{GraphOptions, TaskGraph};
use crate::fs::{FileSystem, RealFileSystem};
use crate::plugin::LocalActions;
use crate::process::WatchOptions;
use crate::project::Project;
use crate::tasks::TaskContext;
use crate::vcs::GitHandler;
use crate::watch::{spawn_watcher, WatchEvent};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the project model
/// - the local plugin backend
/// - the task graph runtime
/// - (optional) file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let root = config_root_dir(&config_path);
    let root = root.canonicalize().unwrap_or(root);
    let config_path = config_path.canonicalize().unwrap_or(config_path);

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let project = Arc::new(
        Project::new(&root, &cfg, Arc::new(GitHandler::new()), Arc::clone(&fs))?.with_config_path(config_path),
    );
    info!(project = %project.name(), root = ?project.root(), "loaded project");
    project.warm_versions().await;

    let actions = Arc::new(LocalActions::new(project.state_dir(), fs));
    let ctx = Arc::new(TaskContext::new(Arc::clone(&project), actions.clone()));

    let options = GraphOptions {
        concurrency: args.concurrency.unwrap_or(project.concurrency()).max(1),
    };
    let (graph, runtime) = TaskGraph::spawn(Arc::clone(&ctx), options);

    // Watch events, fed by the file watcher and by Ctrl-C.
    let (watch_tx, watch_rx) = mpsc::channel::<WatchEvent>(64);
    let _watcher = if args.command.watches() {
        Some(spawn_watcher(Arc::clone(&project), watch_tx.clone())?)
    } else {
        None
    };

    // Ctrl-C → stop watching and interrupt the graph.
    {
        let graph = graph.clone();
        let watch_tx = watch_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("interrupted; shutting down");
            let _ = watch_tx.send(WatchEvent::Shutdown).await;
            graph.shutdown().await;
        });
    }

    let watch = WatchOptions {
        events: args.command.watches().then_some(watch_rx),
        ..WatchOptions::default()
    };

    let outcome = match &args.command {
        Command::Build(a) => build_command(&graph, &ctx, a, watch)
            .await
            .and_then(|r| handle_task_results("build", &r)),
        Command::Deploy(a) => deploy_command(&graph, &ctx, a, watch)
            .await
            .and_then(|r| handle_task_results("deploy", &r)),
        Command::Test(a) => test_command(&graph, &ctx, a, watch)
            .await
            .and_then(|r| handle_task_results("test", &r)),
        Command::Publish(a) => publish_command(&graph, &ctx, a)
            .await
            .and_then(|r| handle_task_results("publish", &r)),
        Command::Run(a) => run_command(&graph, &ctx, a).await.map(|result| {
            print!("{}", result.output);
        }),
    };

    graph.shutdown().await;
    drop(graph);
    match runtime.await {
        Ok(res) => res?,
        Err(e) => debug!(error = %e, "graph runtime task ended abnormally"),
    }
    actions.shutdown().await;

    Ok(outcome?)
}
