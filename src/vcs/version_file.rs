// src/vcs/version_file.rs

//! Version files.
//!
//! A tree version file at a module root overrides source control for trees
//! git cannot see (vendored or generated code). Module version files record
//! the full [`ModuleVersion`] a build output was produced from.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{DevdagError, Result};
use crate::fs::FileSystem;
use crate::vcs::version::{ModuleVersion, TreeVersion};

pub const VERSION_FILE_NAME: &str = ".devdag-version";

pub fn tree_version_file_path(module_root: &Path) -> PathBuf {
    module_root.join(VERSION_FILE_NAME)
}

/// Read the tree version file at `module_root`.
///
/// Returns `Ok(None)` when the file is absent or only whitespace.
pub fn read_tree_version_file(fs: &dyn FileSystem, module_root: &Path) -> Result<Option<TreeVersion>> {
    let path = tree_version_file_path(module_root);
    let Some(version) = read_json::<TreeVersion>(fs, &path)? else {
        return Ok(None);
    };

    if version.latest_commit.trim().is_empty() {
        return Err(DevdagError::VersionFile {
            contents: fs.read_to_string(&path)?,
            path,
            reason: "latestCommit must not be empty".to_string(),
        });
    }

    Ok(Some(version))
}

pub fn write_tree_version_file(fs: &dyn FileSystem, module_root: &Path, version: &TreeVersion) -> Result<()> {
    write_json(fs, &tree_version_file_path(module_root), version)
}

/// Read a module version file at an explicit path.
pub fn read_module_version_file(fs: &dyn FileSystem, path: &Path) -> Result<Option<ModuleVersion>> {
    read_json(fs, path)
}

pub fn write_module_version_file(fs: &dyn FileSystem, path: &Path, version: &ModuleVersion) -> Result<()> {
    write_json(fs, path, version)
}

fn read_json<T: DeserializeOwned>(fs: &dyn FileSystem, path: &Path) -> Result<Option<T>> {
    if !fs.is_file(path) {
        return Ok(None);
    }

    let contents = fs.read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| DevdagError::VersionFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
            contents,
        })
}

fn write_json<T: Serialize>(fs: &dyn FileSystem, path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    fs.write(path, json.as_bytes())?;
    Ok(())
}
