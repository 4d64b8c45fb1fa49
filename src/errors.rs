// src/errors.rs

//! Crate-wide error types.
//!
//! [`DevdagError`] is what the public API returns. [`TaskError`] is the
//! clonable error stored per task in the results map, so that dependents and
//! waiters can all observe the same failure.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Test '{test}' not found in module '{module}'")]
    TestNotFound { module: String, test: String },

    #[error("Cycle detected in task dependencies: {0}")]
    DagCycle(String),

    #[error("Malformed version file {path:?} ({reason}): {contents:?}")]
    VersionFile {
        path: PathBuf,
        contents: String,
        reason: String,
    },

    #[error(
        "Module {module} has uncommitted changes. Please commit them, clean the module's source tree, or set the --allow-dirty flag to override."
    )]
    DirtyPublish { module: String },

    #[error("{count} {kind} task(s) failed!")]
    TasksFailed { count: usize, kind: String },

    #[error("Task graph run was interrupted")]
    Interrupted,

    #[error("Task graph runtime is no longer running")]
    GraphClosed,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DevdagError {
    /// Whether this error belongs to the configuration class (as opposed to
    /// an execution failure inside a backend).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DevdagError::ConfigError(_)
                | DevdagError::DagCycle(_)
                | DevdagError::VersionFile { .. }
                | DevdagError::DirtyPublish { .. }
                | DevdagError::ModuleNotFound(_)
                | DevdagError::ServiceNotFound(_)
                | DevdagError::TestNotFound { .. }
        )
    }
}

/// Failure recorded for a single task key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Execution(String),

    /// The task never ran because something it depends on failed.
    #[error("dependency '{dependency}' failed (caused by '{root_cause}': {message})")]
    DependencyFailed {
        dependency: String,
        root_cause: String,
        message: String,
    },

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Build the error a dependent carries when `dependency` failed with
    /// `cause`. The root cause key is carried through chains of dependents.
    pub fn dependency_failed(dependency: &str, cause: &TaskError) -> Self {
        match cause {
            TaskError::DependencyFailed {
                root_cause,
                message,
                ..
            } => TaskError::DependencyFailed {
                dependency: dependency.to_string(),
                root_cause: root_cause.clone(),
                message: message.clone(),
            },
            other => TaskError::DependencyFailed {
                dependency: dependency.to_string(),
                root_cause: dependency.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Whether the task itself ran (or tried to) and failed.
    pub fn is_direct(&self) -> bool {
        !matches!(self, TaskError::DependencyFailed { .. })
    }
}

impl From<&DevdagError> for TaskError {
    fn from(err: &DevdagError) -> Self {
        if err.is_configuration() {
            TaskError::Configuration(err.to_string())
        } else {
            // `{:#}` keeps the anyhow context chain on one line.
            match err {
                DevdagError::Other(inner) => TaskError::Execution(format!("{inner:#}")),
                other => TaskError::Execution(other.to_string()),
            }
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevdagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_failure_keeps_root_cause_through_chain() {
        let root = TaskError::Execution("exit code 2".into());
        let b = TaskError::dependency_failed("build.c", &root);
        let a = TaskError::dependency_failed("build.b", &b);

        assert_eq!(
            a,
            TaskError::DependencyFailed {
                dependency: "build.b".into(),
                root_cause: "build.c".into(),
                message: "exit code 2".into(),
            }
        );
        assert!(!a.is_direct());
        assert!(root.is_direct());
    }

    #[test]
    fn tasks_failed_message_matches_summary_format() {
        let err = DevdagError::TasksFailed {
            count: 2,
            kind: "build".into(),
        };
        assert_eq!(err.to_string(), "2 build task(s) failed!");
    }
}
