// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level project configuration as read from `devdag.toml`.
///
/// ```toml
/// [project]
/// name = "demo"
/// concurrency = 4
///
/// [module.api]
/// path = "services/api"
///
/// [module.api.build]
/// command = "cargo build"
/// dependencies = ["common"]
///
/// [module.api.service.api]
/// command = "./run.sh"
/// dependencies = ["db"]
/// ```
///
/// Validation lives in [`crate::config::validate`]; this type is only ever
/// constructed through `TryFrom<RawProjectConfig>` or
/// [`ProjectConfig::new_unchecked`].
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub module: BTreeMap<String, ModuleConfig>,
}

impl ProjectConfig {
    /// Build a config without running validation. Used by builders and by
    /// `TryFrom` once validation has passed.
    pub fn new_unchecked(project: ProjectSection, module: BTreeMap<String, ModuleConfig>) -> Self {
        Self { project, module }
    }
}

/// Raw deserialized form, before semantic validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub module: BTreeMap<String, ModuleConfig>,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    #[serde(default)]
    pub name: Option<String>,

    /// Maximum number of tasks processed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Directory (relative to the project root) where the local backend keeps
    /// build and test records.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_concurrency() -> usize {
    4
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".devdag")
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: None,
            concurrency: default_concurrency(),
            state_dir: default_state_dir(),
        }
    }
}

/// `[module.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// Module root relative to the project root. Defaults to the module name.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub build: BuildConfig,

    /// Globs (relative to the module root) ignored by the watcher.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Command run for in-place updates. A module with this set is
    /// hot-reload capable.
    #[serde(default)]
    pub hot_reload: Option<String>,

    #[serde(default)]
    pub push: Option<String>,

    #[serde(default)]
    pub publish: Option<String>,

    #[serde(default)]
    pub service: BTreeMap<String, ServiceConfig>,

    #[serde(default)]
    pub test: BTreeMap<String, TestConfig>,
}

/// `[module.<name>.build]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(default)]
    pub command: Option<String>,

    /// Names of modules that must be built first.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// `[module.<name>.service.<service>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Deploy command. Without one, deploying only records the version.
    #[serde(default)]
    pub command: Option<String>,

    /// Runtime dependencies (service names).
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Keep the command running in the background after it becomes ready.
    #[serde(default)]
    pub long_lived: bool,

    /// Regex on stdout that marks a long-lived service as ready.
    #[serde(default)]
    pub ready_on_stdout: Option<String>,

    /// Duration (e.g. `"500ms"`, `"2s"`) after which a long-lived service
    /// counts as ready.
    #[serde(default)]
    pub ready_after: Option<String>,
}

/// `[module.<name>.test.<test>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    pub command: String,

    /// Services that must be deployed before the test runs.
    #[serde(default)]
    pub dependencies: Vec<String>,
}
