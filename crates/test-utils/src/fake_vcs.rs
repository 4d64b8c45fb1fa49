use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use devdag::vcs::{TreeVersion, VcsHandler};

/// Commit every tree reports unless told otherwise.
pub const DEFAULT_COMMIT: &str = "1111111111";

/// In-memory source control. Clones share state, so a test can keep one
/// and change tree versions while a project uses the other.
#[derive(Debug, Clone, Default)]
pub struct FakeVcs {
    trees: Arc<Mutex<HashMap<PathBuf, TreeVersion>>>,
    /// Every lookup, with the thread it ran on.
    lookups: Arc<Mutex<Vec<(PathBuf, ThreadId)>>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: impl Into<PathBuf>, version: TreeVersion) {
        self.trees.lock().unwrap().insert(path.into(), version);
    }

    pub fn lookups(&self) -> Vec<(PathBuf, ThreadId)> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn clear_lookups(&self) {
        self.lookups.lock().unwrap().clear();
    }
}

impl VcsHandler for FakeVcs {
    fn name(&self) -> &str {
        "fake"
    }

    fn get_tree_version(&self, path: &Path) -> anyhow::Result<TreeVersion> {
        self.lookups
            .lock()
            .unwrap()
            .push((path.to_path_buf(), std::thread::current().id()));
        Ok(self
            .trees
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| TreeVersion::clean(DEFAULT_COMMIT)))
    }
}
