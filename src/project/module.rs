// src/project/module.rs

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ModuleConfig, ServiceConfig, TestConfig};

/// A named unit of source, resolved against the project root.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    /// Absolute (or root-relative, in tests) module root.
    pub path: PathBuf,
    pub config: ModuleConfig,
}

impl Module {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, config: ModuleConfig) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            config,
        }
    }

    pub fn build_dependencies(&self) -> &[String] {
        &self.config.build.dependencies
    }

    /// Whether the module declares a hot-reload command.
    pub fn supports_hot_reload(&self) -> bool {
        self.config.hot_reload.is_some()
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.config.service.keys().map(String::as_str)
    }

    pub fn tests(&self) -> impl Iterator<Item = (&str, &TestConfig)> {
        self.config.test.iter().map(|(n, t)| (n.as_str(), t))
    }
}

/// A runtime service declared by a module.
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub module: Arc<Module>,
    pub config: ServiceConfig,
}

impl Service {
    pub fn dependencies(&self) -> &[String] {
        &self.config.dependencies
    }
}
