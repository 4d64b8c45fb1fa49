#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use devdag::config::{ModuleConfig, ProjectConfig, ProjectSection, ServiceConfig, TestConfig};
use devdag::fs::MockFileSystem;
use devdag::project::Project;
use devdag::vcs::TreeVersion;

use crate::fake_vcs::FakeVcs;

pub const PROJECT_ROOT: &str = "/project";

/// Builder for a `Project` backed by `FakeVcs` and `MockFileSystem`.
///
/// Modules live at `<root>/<name>` unless given a path.
pub struct ProjectBuilder {
    root: PathBuf,
    section: ProjectSection,
    modules: BTreeMap<String, ModuleConfig>,
    vcs: FakeVcs,
    fs: MockFileSystem,
    config_path: Option<PathBuf>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from(PROJECT_ROOT),
            section: ProjectSection {
                name: Some("test-project".to_string()),
                ..ProjectSection::default()
            },
            modules: BTreeMap::new(),
            vcs: FakeVcs::new(),
            fs: MockFileSystem::new(),
            config_path: None,
        }
    }

    /// Project root. Defaults to [`PROJECT_ROOT`].
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.section.concurrency = n;
        self
    }

    pub fn module(mut self, name: &str, f: impl FnOnce(ModuleBuilder) -> ModuleBuilder) -> Self {
        let module = f(ModuleBuilder::default()).config;
        self.modules.insert(name.to_string(), module);
        self
    }

    /// Set the tree version source control reports for a module at its
    /// default path.
    pub fn tree(self, module: &str, version: TreeVersion) -> Self {
        self.vcs.set(self.root.join(module), version);
        self
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Handle on the source control the project will use.
    pub fn vcs(&self) -> FakeVcs {
        self.vcs.clone()
    }

    /// Handle on the filesystem the project will use.
    pub fn fs(&self) -> MockFileSystem {
        self.fs.clone()
    }

    /// Validate the config and build the project.
    pub fn build(self) -> Arc<Project> {
        self.try_build().expect("Failed to build valid project from builder")
    }

    pub fn try_build(self) -> devdag::errors::Result<Arc<Project>> {
        let config = ProjectConfig::new_unchecked(self.section, self.modules);
        devdag::config::validate_config(&config)?;

        let mut project = Project::new(self.root, &config, Arc::new(self.vcs), Arc::new(self.fs))?;
        if let Some(path) = self.config_path {
            project = project.with_config_path(path);
        }
        Ok(Arc::new(project))
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Path a module gets under the default root.
pub fn module_path(name: &str) -> PathBuf {
    PathBuf::from(PROJECT_ROOT).join(name)
}

/// Builder for `ModuleConfig`.
#[derive(Default)]
pub struct ModuleBuilder {
    config: ModuleConfig,
}

impl ModuleBuilder {
    /// Module root relative to the project root.
    pub fn path(mut self, path: &str) -> Self {
        self.config.path = Some(PathBuf::from(path));
        self
    }

    pub fn build_deps(mut self, deps: &[&str]) -> Self {
        self.config.build.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn build_command(mut self, cmd: &str) -> Self {
        self.config.build.command = Some(cmd.to_string());
        self
    }

    /// Add a service with the given runtime dependencies.
    pub fn service(mut self, name: &str, deps: &[&str]) -> Self {
        self.config.service.insert(
            name.to_string(),
            ServiceConfig {
                dependencies: deps.iter().map(|d| d.to_string()).collect(),
                ..ServiceConfig::default()
            },
        );
        self
    }

    /// Add a service with a full config.
    pub fn service_with(mut self, name: &str, config: ServiceConfig) -> Self {
        self.config.service.insert(name.to_string(), config);
        self
    }

    /// Add a test that needs the given services deployed.
    pub fn test(self, name: &str, deps: &[&str]) -> Self {
        let command = format!("run-{name}");
        self.test_with(name, &command, deps)
    }

    pub fn test_with(mut self, name: &str, command: &str, deps: &[&str]) -> Self {
        self.config.test.insert(
            name.to_string(),
            TestConfig {
                command: command.to_string(),
                dependencies: deps.iter().map(|d| d.to_string()).collect(),
            },
        );
        self
    }

    pub fn hot_reload(mut self, cmd: &str) -> Self {
        self.config.hot_reload = Some(cmd.to_string());
        self
    }

    pub fn push(mut self, cmd: &str) -> Self {
        self.config.push = Some(cmd.to_string());
        self
    }

    pub fn publish(mut self, cmd: &str) -> Self {
        self.config.publish = Some(cmd.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.exclude.push(pattern.to_string());
        self
    }
}
