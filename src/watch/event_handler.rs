// src/watch/event_handler.rs

//! Maps changed paths to watch events.

use std::path::Path;

use tracing::{debug, trace};

use crate::project::Project;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::ModuleWatchProfile;
use crate::watch::WatchEvent;

/// Decide what a change at `path` means for the project.
///
/// - The project config file yields [`WatchEvent::ConfigChanged`].
/// - Paths under the state dir or a `.git` directory are ignored.
/// - Otherwise the deepest module containing the path changed, unless the
///   path matches one of that module's `exclude` globs.
pub fn classify_path(project: &Project, profiles: &[ModuleWatchProfile], path: &Path) -> Option<WatchEvent> {
    let root = project.root();
    let Some(rel) = relative_str(root, path) else {
        trace!(?path, "change outside project root; ignoring");
        return None;
    };

    if let Some(config) = project.config_path() {
        if relative_str(root, config).is_some_and(|c| c == rel) {
            debug!(path = %rel, "project config changed");
            return Some(WatchEvent::ConfigChanged);
        }
    }

    if let Some(state) = relative_str(root, project.state_dir()) {
        if !state.is_empty() && (rel == state || rel.starts_with(&format!("{state}/"))) {
            return None;
        }
    }

    let abs = root.join(&rel);
    let module = project.module_for_path(&abs)?;
    let module_rel = relative_str(&module.path, &abs)?;

    let included = profiles
        .iter()
        .find(|p| p.name() == module.name)
        .is_none_or(|p| p.matches(&module_rel));
    if !included {
        trace!(module = %module.name, path = %module_rel, "path excluded for module");
        return None;
    }

    debug!(module = %module.name, path = %rel, "watch match -> module changed");
    Some(WatchEvent::ModuleChanged(module.name.clone()))
}
