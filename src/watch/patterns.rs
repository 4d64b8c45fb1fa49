// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::project::Project;

/// Directory names never worth reacting to, wherever they appear.
pub const ALWAYS_IGNORED: &[&str] = &[".git"];

/// Compiled `exclude` globs for a single module.
///
/// Patterns are relative to the module root; the watcher passes paths like
/// `"src/main.rs"` into `matches`.
#[derive(Clone)]
pub struct ModuleWatchProfile {
    name: String,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for ModuleWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleWatchProfile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ModuleWatchProfile {
    pub fn new(name: impl Into<String>, exclude: &[String]) -> Result<Self> {
        let name = name.into();
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).with_context(|| format!("building exclude globset for module {name}"))?)
        };
        Ok(Self { name, exclude_set })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if a change at `rel_path` (relative to the module root)
    /// should count as a change to the module.
    pub fn matches(&self, rel_path: &str) -> bool {
        if rel_path
            .split('/')
            .any(|component| ALWAYS_IGNORED.contains(&component))
        {
            return false;
        }
        !self
            .exclude_set
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(rel_path))
    }
}

/// Build a compiled profile for each module of the project.
pub fn build_module_profiles(project: &Project) -> Result<Vec<ModuleWatchProfile>> {
    project
        .modules()
        .iter()
        .map(|m| ModuleWatchProfile::new(m.name.clone(), &m.config.exclude))
        .collect()
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
