// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::project::Project;
use crate::watch::event_handler::classify_path;
use crate::watch::patterns::{build_module_profiles, ModuleWatchProfile};
use crate::watch::WatchEvent;

/// Editors write a file in several steps; changes arriving within this
/// window are reported once.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher on the project root that sends a
/// [`WatchEvent`] for every module (or config) change.
pub fn spawn_watcher(project: Arc<Project>, events_tx: mpsc::Sender<WatchEvent>) -> Result<WatcherHandle> {
    let profiles = build_module_profiles(&project)?;

    // Channel from the blocking notify callback into the async world.
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = raw_tx.send(event) {
                    // We can't log via tracing here reliably, so fall back to stderr.
                    eprintln!("devdag: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("devdag: file watch error: {err}"),
        },
        Config::default(),
    )?;

    watcher.watch(project.root(), RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", project.root());

    tokio::spawn(async move {
        while let Some(first) = raw_rx.recv().await {
            let mut batch = BTreeSet::new();
            collect(&project, &profiles, first, &mut batch);

            // Fold in whatever else arrives within the debounce window.
            while let Ok(Some(event)) = tokio::time::timeout(DEBOUNCE, raw_rx.recv()).await {
                collect(&project, &profiles, event, &mut batch);
            }

            for event in batch {
                if events_tx.send(event).await.is_err() {
                    debug!("watch event receiver dropped; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

fn collect(
    project: &Project,
    profiles: &[ModuleWatchProfile],
    event: Event,
    batch: &mut BTreeSet<WatchEvent>,
) {
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }
    if event.need_rescan() {
        warn!("watcher requested a rescan; some changes may have been missed");
    }
    batch.extend(
        event
            .paths
            .iter()
            .filter_map(|path| classify_path(project, profiles, path)),
    );
}
