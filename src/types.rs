// src/types.rs

//! Small shared enums used across modules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of unit of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Build,
    Push,
    Deploy,
    Test,
    Publish,
    HotReload,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Build => "build",
            TaskType::Push => "push",
            TaskType::Deploy => "deploy",
            TaskType::Test => "test",
            TaskType::Publish => "publish",
            TaskType::HotReload => "hot-reload",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-reported state of a deployed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Ready,
    Deploying,
    Stopped,
    Unhealthy,
    #[default]
    Missing,
    Unknown,
}
