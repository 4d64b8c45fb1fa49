// src/vcs/version.rs

//! Tree and module version types and the rules that combine them.
//!
//! Everything in here is a pure function of its inputs: the same tree
//! versions always produce the same [`ModuleVersion`], whatever order the
//! dependencies were discovered in.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Version reported for a tree that has no commits yet.
pub const NEW_MODULE_VERSION: &str = "0000000000";

/// Prefix marking a version string as a hash over several trees.
pub const HASHED_VERSION_PREFIX: char = 'v';

const HASH_LENGTH: usize = 10;

/// Content state of one source tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeVersion {
    pub latest_commit: String,
    /// Newest modification time (unix seconds) of uncommitted changes.
    /// Required in version files; `null` for a clean tree.
    #[serde(deserialize_with = "present_or_null")]
    pub dirty_timestamp: Option<u64>,
}

/// A plain `Option` field would accept a missing key; this one has to be
/// spelled out, even as `null`.
fn present_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<u64>::deserialize(deserializer)
}

impl TreeVersion {
    pub fn clean(commit: impl Into<String>) -> Self {
        Self {
            latest_commit: commit.into(),
            dirty_timestamp: None,
        }
    }

    pub fn dirty(commit: impl Into<String>, timestamp: u64) -> Self {
        Self {
            latest_commit: commit.into(),
            dirty_timestamp: Some(timestamp),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_timestamp.is_some()
    }

    /// `<commit>` for clean trees, `<commit>-<dirtyTimestamp>` for dirty ones.
    pub fn version_string(&self) -> String {
        match self.dirty_timestamp {
            Some(ts) => format!("{}-{}", self.latest_commit, ts),
            None => self.latest_commit.clone(),
        }
    }
}

/// Version of a module combined with the trees it structurally depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleVersion {
    pub version_string: String,
    #[serde(default)]
    pub dirty_timestamp: Option<u64>,
    #[serde(default)]
    pub dependency_versions: BTreeMap<String, TreeVersion>,
}

impl ModuleVersion {
    pub fn is_dirty(&self) -> bool {
        self.dirty_timestamp.is_some()
    }
}

/// Hash a set of named tree versions into `v<10 hex chars>`.
///
/// Candidates are sorted by name first, so input order never matters.
pub fn hash_versions(candidates: &[(&str, &TreeVersion)]) -> String {
    let mut sorted: Vec<&(&str, &TreeVersion)> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(name, version)| format!("{}_{}", name, version.latest_commit))
        .collect::<Vec<_>>()
        .join(".");

    let digest = blake3::hash(joined.as_bytes()).to_hex();
    format!("{}{}", HASHED_VERSION_PREFIX, &digest[..HASH_LENGTH])
}

/// Combine a module's own tree version with its dependencies' tree versions.
///
/// - No dependencies: the module's own rendered version.
/// - All clean: hash over every candidate.
/// - Some dirty: the candidates sharing the newest dirty timestamp win; a
///   single winner renders its own dirty version, several winners render
///   `<hash of winners>-<timestamp>`.
pub fn combine_versions(
    module_name: &str,
    own: &TreeVersion,
    dependencies: BTreeMap<String, TreeVersion>,
) -> ModuleVersion {
    if dependencies.is_empty() {
        return ModuleVersion {
            version_string: own.version_string(),
            dirty_timestamp: own.dirty_timestamp,
            dependency_versions: dependencies,
        };
    }

    let mut candidates: Vec<(&str, &TreeVersion)> = Vec::with_capacity(dependencies.len() + 1);
    candidates.push((module_name, own));
    candidates.extend(dependencies.iter().map(|(n, v)| (n.as_str(), v)));
    candidates.sort_by(|a, b| a.0.cmp(b.0));

    let latest_dirty = candidates.iter().filter_map(|(_, v)| v.dirty_timestamp).max();

    let (version_string, dirty_timestamp) = match latest_dirty {
        None => (hash_versions(&candidates), None),
        Some(ts) => {
            let tied: Vec<(&str, &TreeVersion)> = candidates
                .iter()
                .filter(|(_, v)| v.dirty_timestamp == Some(ts))
                .copied()
                .collect();

            match tied.as_slice() {
                [(_, only)] => (only.version_string(), Some(ts)),
                _ => (format!("{}-{}", hash_versions(&tied), ts), Some(ts)),
            }
        }
    };

    ModuleVersion {
        version_string,
        dirty_timestamp,
        dependency_versions: dependencies,
    }
}
