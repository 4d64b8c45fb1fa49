// src/plugin/outputs.rs

//! Request/result payloads exchanged with plugin backends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ServiceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    /// `false` when the build was skipped because the output was current.
    pub fresh: bool,
    #[serde(default)]
    pub build_log: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PushResult {
    pub pushed: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceStatus {
    pub state: ServiceState,
    /// Version string the running service was deployed from.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ServiceStatus {
    pub fn ready(version: impl Into<String>) -> Self {
        Self {
            state: ServiceState::Ready,
            version: Some(version.into()),
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub module: String,
    pub test_name: String,
    pub version: String,
    pub success: bool,
    #[serde(default)]
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PublishResult {
    pub published: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HotReloadResult {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    #[serde(default)]
    pub output: String,
}

/// Env var carrying the version string of the module being deployed,
/// tested or reloaded.
pub const MODULE_VERSION_ENV: &str = "DEVDAG_MODULE_VERSION";

/// Environment handed to actions that start or update running code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeContext {
    pub env: BTreeMap<String, String>,
}

impl RuntimeContext {
    pub fn module_version(&self) -> Option<&str> {
        self.env.get(MODULE_VERSION_ENV).map(String::as_str)
    }
}
