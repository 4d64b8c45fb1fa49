// src/vcs/mod.rs

//! Source versions.
//!
//! - [`version`] holds the version types and the combination rules.
//! - [`version_file`] reads and writes the JSON version files.
//! - [`git`] derives tree versions from a git working tree.
//!
//! [`VersionResolver`] ties them together: version file first, source
//! control second, then the combination rules.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::project::Module;

pub mod git;
pub mod version;
pub mod version_file;

pub use git::GitHandler;
pub use version::{
    combine_versions, hash_versions, ModuleVersion, TreeVersion, HASHED_VERSION_PREFIX,
    NEW_MODULE_VERSION,
};
pub use version_file::{read_tree_version_file, write_tree_version_file, VERSION_FILE_NAME};

/// Produces the raw tree version of a directory from source control.
pub trait VcsHandler: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn get_tree_version(&self, path: &Path) -> anyhow::Result<TreeVersion>;
}

#[derive(Debug, Clone)]
pub struct VersionResolver {
    vcs: Arc<dyn VcsHandler>,
    fs: Arc<dyn FileSystem>,
}

impl VersionResolver {
    pub fn new(vcs: Arc<dyn VcsHandler>, fs: Arc<dyn FileSystem>) -> Self {
        Self { vcs, fs }
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Tree version of one directory. A version file wins over source control.
    pub fn resolve_tree_version(&self, path: &Path) -> Result<TreeVersion> {
        if let Some(version) = read_tree_version_file(self.fs.as_ref(), path)? {
            debug!(?path, "using tree version from version file");
            return Ok(version);
        }

        Ok(self.vcs.get_tree_version(path)?)
    }

    /// Version of `module` combined with its structural dependencies.
    pub fn resolve_version(&self, module: &Module, dependencies: &[Arc<Module>]) -> Result<ModuleVersion> {
        let own = self.resolve_tree_version(&module.path)?;

        let mut dependency_versions = BTreeMap::new();
        for dep in dependencies {
            let version = self.resolve_tree_version(&dep.path)?;
            dependency_versions.insert(dep.name.clone(), version);
        }

        let version = combine_versions(&module.name, &own, dependency_versions);
        debug!(
            module = %module.name,
            version = %version.version_string,
            dirty = version.is_dirty(),
            "resolved module version"
        );
        Ok(version)
    }
}
