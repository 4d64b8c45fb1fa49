// src/project/mod.rs

//! The loaded project: modules, services and tests from config, plus the
//! per-module version cache.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use tracing::{debug, warn};

use crate::config::ProjectConfig;
use crate::errors::{DevdagError, Result};
use crate::fs::FileSystem;
use crate::vcs::{ModuleVersion, VcsHandler, VersionResolver};

pub mod module;

pub use module::{Module, Service};

#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    name: String,
    config_path: Option<PathBuf>,
    state_dir: PathBuf,
    concurrency: usize,
    modules: BTreeMap<String, Arc<Module>>,
    services: BTreeMap<String, Arc<Service>>,
    /// Edges point from a module to the modules that depend on it.
    dependants: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    resolver: VersionResolver,
    versions: Mutex<HashMap<String, ModuleVersion>>,
}

impl Project {
    /// Build a project from a validated config. Module paths are resolved
    /// against `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        config: &ProjectConfig,
        vcs: Arc<dyn VcsHandler>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let root = root.into();
        let name = config.project.name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string())
        });

        let mut modules = BTreeMap::new();
        let mut services = BTreeMap::new();
        for (module_name, module_config) in config.module.iter() {
            let rel = module_config
                .path
                .clone()
                .unwrap_or_else(|| PathBuf::from(module_name));
            let module = Arc::new(Module::new(
                module_name.clone(),
                root.join(rel),
                module_config.clone(),
            ));

            for (service_name, service_config) in module_config.service.iter() {
                services.insert(
                    service_name.clone(),
                    Arc::new(Service {
                        name: service_name.clone(),
                        module: Arc::clone(&module),
                        config: service_config.clone(),
                    }),
                );
            }
            modules.insert(module_name.clone(), module);
        }

        let (dependants, nodes) = build_dependants_graph(&modules, &services);

        Ok(Self {
            state_dir: root.join(&config.project.state_dir),
            concurrency: config.project.concurrency,
            root,
            name,
            config_path: None,
            modules,
            services,
            dependants,
            nodes,
            resolver: VersionResolver::new(vcs, fs),
            versions: Mutex::new(HashMap::new()),
        })
    }

    /// Remember which file the project was loaded from, so the watcher can
    /// detect config edits.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    pub fn module(&self, name: &str) -> Result<Arc<Module>> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| DevdagError::ModuleNotFound(name.to_string()))
    }

    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.values().cloned().collect()
    }

    /// Modules by name; an empty list selects every module.
    pub fn modules_named(&self, names: &[String]) -> Result<Vec<Arc<Module>>> {
        if names.is_empty() {
            return Ok(self.modules());
        }
        names.iter().map(|n| self.module(n)).collect()
    }

    pub fn service(&self, name: &str) -> Result<Arc<Service>> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| DevdagError::ServiceNotFound(name.to_string()))
    }

    pub fn services(&self) -> Vec<Arc<Service>> {
        self.services.values().cloned().collect()
    }

    pub fn services_named(&self, names: &[String]) -> Result<Vec<Arc<Service>>> {
        names.iter().map(|n| self.service(n)).collect()
    }

    /// Services declared by `modules`, optionally restricted to `filter`.
    pub fn services_for_modules(&self, modules: &[Arc<Module>], filter: Option<&[String]>) -> Vec<Arc<Service>> {
        modules
            .iter()
            .flat_map(|m| m.service_names().filter_map(|s| self.services.get(s).cloned()))
            .filter(|s| filter.is_none_or(|names| names.iter().any(|n| n == &s.name)))
            .collect()
    }

    /// Direct build dependencies of `module`.
    pub fn build_dependencies(&self, module: &Module) -> Result<Vec<Arc<Module>>> {
        module
            .build_dependencies()
            .iter()
            .map(|n| self.module(n))
            .collect()
    }

    /// Transitive build dependencies of `module`, sorted by name.
    pub fn structural_dependencies(&self, module: &Module) -> Result<Vec<Arc<Module>>> {
        let mut seen: BTreeMap<String, Arc<Module>> = BTreeMap::new();
        let mut stack: Vec<String> = module.build_dependencies().to_vec();

        while let Some(name) = stack.pop() {
            if name == module.name || seen.contains_key(&name) {
                continue;
            }
            let dep = self.module(&name)?;
            stack.extend(dep.build_dependencies().iter().cloned());
            seen.insert(name, dep);
        }

        Ok(seen.into_values().collect())
    }

    /// Cached version of a module, resolved on first use.
    pub fn module_version(&self, name: &str) -> Result<ModuleVersion> {
        if let Some(version) = self.lock_versions().get(name) {
            return Ok(version.clone());
        }

        let module = self.module(name)?;
        let deps = self.structural_dependencies(&module)?;
        let version = self.resolver.resolve_version(&module, &deps)?;

        self.lock_versions()
            .insert(name.to_string(), version.clone());
        Ok(version)
    }

    /// Resolve every module version on the blocking pool, so that lookups
    /// made from async code afterwards are cache hits. Failures are left
    /// for the task that needs the version to report.
    pub async fn warm_versions(self: &Arc<Self>) {
        let project = Arc::clone(self);
        let resolved = tokio::task::spawn_blocking(move || {
            for name in project.modules.keys() {
                if let Err(err) = project.module_version(name) {
                    debug!(module = %name, error = %err, "version not resolved ahead of use");
                }
            }
        })
        .await;

        if let Err(err) = resolved {
            warn!(error = %err, "version resolution panicked");
        }
    }

    /// Drop every cached version. Called whenever sources change.
    pub fn invalidate_versions(&self) {
        debug!("invalidating cached module versions");
        self.lock_versions().clear();
    }

    /// Modules that depend on `name`, directly or transitively, sorted by
    /// name. Dependencies through build deps and through services both count.
    pub fn dependants_of(&self, name: &str) -> Vec<Arc<Module>> {
        let Some(&start) = self.nodes.get(name) else {
            warn!(module = %name, "dependants requested for unknown module");
            return Vec::new();
        };

        let mut found = BTreeSet::new();
        let mut bfs = Bfs::new(&self.dependants, start);
        while let Some(ix) = bfs.next(&self.dependants) {
            if ix != start {
                found.insert(self.dependants[ix].clone());
            }
        }

        found
            .into_iter()
            .filter_map(|n| self.modules.get(&n).cloned())
            .collect()
    }

    /// Names of the modules owning `service_names`. Every such module must
    /// declare a hot-reload command.
    pub fn hot_reload_module_names(&self, service_names: &[String]) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for service in self.services_named(service_names)? {
            if !service.module.supports_hot_reload() {
                return Err(DevdagError::ConfigError(format!(
                    "service '{}' cannot be hot-reloaded: module '{}' has no hot_reload command",
                    service.name, service.module.name
                )));
            }
            names.insert(service.module.name.clone());
        }
        Ok(names)
    }

    /// The deepest module whose root contains `path`.
    pub fn module_for_path(&self, path: &Path) -> Option<Arc<Module>> {
        self.modules
            .values()
            .filter(|m| path.starts_with(&m.path))
            .max_by_key(|m| m.path.components().count())
            .cloned()
    }

    fn lock_versions(&self) -> MutexGuard<'_, HashMap<String, ModuleVersion>> {
        self.versions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn build_dependants_graph(
    modules: &BTreeMap<String, Arc<Module>>,
    services: &BTreeMap<String, Arc<Service>>,
) -> (DiGraph<String, ()>, HashMap<String, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for name in modules.keys() {
        nodes.insert(name.clone(), graph.add_node(name.clone()));
    }

    let mut add_edge = |from: &str, to: &str| {
        if from == to {
            return;
        }
        if let (Some(&a), Some(&b)) = (nodes.get(from), nodes.get(to)) {
            graph.update_edge(a, b, ());
        }
    };

    for module in modules.values() {
        for dep in module.build_dependencies() {
            add_edge(dep, &module.name);
        }

        let runtime_deps = module
            .config
            .service
            .values()
            .flat_map(|s| s.dependencies.iter())
            .chain(module.config.test.values().flat_map(|t| t.dependencies.iter()));

        for service_name in runtime_deps {
            if let Some(service) = services.get(service_name) {
                add_edge(&service.module.name, &module.name);
            }
        }
    }

    (graph, nodes)
}
