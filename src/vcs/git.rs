// src/vcs/git.rs

use std::path::Path;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::vcs::version::{TreeVersion, NEW_MODULE_VERSION};
use crate::vcs::VcsHandler;

/// Source control handler backed by the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitHandler;

impl GitHandler {
    pub fn new() -> Self {
        Self
    }

    fn git(&self, cwd: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .with_context(|| format!("running git {} in {:?}", args.join(" "), cwd))?;

        if !output.status.success() {
            bail!(
                "git {} failed in {:?}: {}",
                args.join(" "),
                cwd,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn has_head(&self, path: &Path) -> bool {
        self.git(path, &["rev-parse", "--verify", "--quiet", "HEAD"])
            .is_ok()
    }

    /// Files under `path` that differ from HEAD, relative to `path`.
    fn dirty_files(&self, path: &Path, has_head: bool) -> Result<Vec<String>> {
        let mut files = Vec::new();

        if has_head {
            let changed = self.git(path, &["diff-index", "--name-only", "--relative", "HEAD", "--", "."])?;
            files.extend(changed.lines().map(str::to_string));
            let untracked = self.git(path, &["ls-files", "--others", "--exclude-standard"])?;
            files.extend(untracked.lines().map(str::to_string));
        } else {
            let all = self.git(path, &["ls-files", "--cached", "--others", "--exclude-standard"])?;
            files.extend(all.lines().map(str::to_string));
        }

        files.retain(|f| !f.trim().is_empty());
        files.sort();
        files.dedup();
        Ok(files)
    }
}

impl VcsHandler for GitHandler {
    fn name(&self) -> &str {
        "git"
    }

    fn get_tree_version(&self, path: &Path) -> Result<TreeVersion> {
        let has_head = self.has_head(path);

        let commit = if has_head {
            let out = self.git(
                path,
                &["rev-list", "-1", "--abbrev-commit", "--abbrev=10", "HEAD", "--", "."],
            )?;
            let trimmed = out.trim();
            if trimmed.is_empty() {
                NEW_MODULE_VERSION.to_string()
            } else {
                trimmed.to_string()
            }
        } else {
            NEW_MODULE_VERSION.to_string()
        };

        let dirty = self.dirty_files(path, has_head)?;
        if dirty.is_empty() {
            return Ok(TreeVersion::clean(commit));
        }

        let timestamp = newest_modification(path, &dirty).unwrap_or_else(now_secs);
        debug!(?path, dirty_files = dirty.len(), timestamp, "tree has uncommitted changes");

        Ok(TreeVersion::dirty(commit, timestamp))
    }
}

/// Newest mtime (unix seconds) among `files`. Deleted files are skipped.
fn newest_modification(root: &Path, files: &[String]) -> Option<u64> {
    files
        .iter()
        .filter_map(|f| std::fs::metadata(root.join(f)).ok())
        .filter_map(|meta| meta.modified().ok())
        .filter_map(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .max()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
