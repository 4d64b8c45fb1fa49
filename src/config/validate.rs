// src/config/validate.rs

use std::collections::BTreeMap;

use globset::Glob;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::config::model::{ProjectConfig, RawProjectConfig};
use crate::errors::{DevdagError, Result};

impl TryFrom<RawProjectConfig> for ProjectConfig {
    type Error = DevdagError;

    fn try_from(raw: RawProjectConfig) -> std::result::Result<Self, Self::Error> {
        let cfg = ProjectConfig::new_unchecked(raw.project, raw.module);
        validate_config(&cfg)?;
        Ok(cfg)
    }
}

/// Run every semantic check on a config.
///
/// Service dependency cycles are not checked here; the task graph reports
/// them with the full discovery path.
pub fn validate_config(cfg: &ProjectConfig) -> Result<()> {
    ensure_has_modules(cfg)?;
    validate_project_section(cfg)?;
    validate_build_dependencies(cfg)?;
    validate_build_dag(cfg)?;
    let services = collect_services(cfg)?;
    validate_runtime_dependencies(cfg, &services)?;
    validate_patterns(cfg)?;
    Ok(())
}

fn ensure_has_modules(cfg: &ProjectConfig) -> Result<()> {
    if cfg.module.is_empty() {
        return Err(DevdagError::ConfigError(
            "config must contain at least one [module.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_project_section(cfg: &ProjectConfig) -> Result<()> {
    if cfg.project.concurrency == 0 {
        return Err(DevdagError::ConfigError(
            "[project].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_build_dependencies(cfg: &ProjectConfig) -> Result<()> {
    for (name, module) in cfg.module.iter() {
        for dep in module.build.dependencies.iter() {
            if dep == name {
                return Err(DevdagError::ConfigError(format!(
                    "module '{}' cannot list itself as a build dependency",
                    name
                )));
            }
            if !cfg.module.contains_key(dep) {
                return Err(DevdagError::ConfigError(format!(
                    "module '{}' has unknown build dependency '{}'",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_build_dag(cfg: &ProjectConfig) -> Result<()> {
    // Edge direction: dependency -> module.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.module.keys() {
        graph.add_node(name.as_str());
    }

    for (name, module) in cfg.module.iter() {
        for dep in module.build.dependencies.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(DevdagError::DagCycle(format!(
            "cycle detected in build dependencies involving module '{}'",
            cycle.node_id()
        ))),
    }
}

/// Map of service name to owning module, rejecting duplicates.
fn collect_services(cfg: &ProjectConfig) -> Result<BTreeMap<&str, &str>> {
    let mut services = BTreeMap::new();
    for (module_name, module) in cfg.module.iter() {
        for service_name in module.service.keys() {
            if let Some(existing) = services.insert(service_name.as_str(), module_name.as_str()) {
                return Err(DevdagError::ConfigError(format!(
                    "service '{}' is defined by both module '{}' and module '{}'",
                    service_name, existing, module_name
                )));
            }
        }
    }
    Ok(services)
}

fn validate_runtime_dependencies(cfg: &ProjectConfig, services: &BTreeMap<&str, &str>) -> Result<()> {
    for (module_name, module) in cfg.module.iter() {
        for (service_name, service) in module.service.iter() {
            for dep in service.dependencies.iter() {
                if dep == service_name {
                    return Err(DevdagError::ConfigError(format!(
                        "service '{}' cannot depend on itself",
                        service_name
                    )));
                }
                if !services.contains_key(dep.as_str()) {
                    return Err(DevdagError::ConfigError(format!(
                        "service '{}' (module '{}') has unknown dependency '{}'",
                        service_name, module_name, dep
                    )));
                }
            }
        }

        for (test_name, test) in module.test.iter() {
            for dep in test.dependencies.iter() {
                if !services.contains_key(dep.as_str()) {
                    return Err(DevdagError::ConfigError(format!(
                        "test '{}.{}' has unknown service dependency '{}'",
                        module_name, test_name, dep
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_patterns(cfg: &ProjectConfig) -> Result<()> {
    for (module_name, module) in cfg.module.iter() {
        for pattern in module.exclude.iter() {
            Glob::new(pattern).map_err(|e| {
                DevdagError::ConfigError(format!(
                    "module '{}' has invalid exclude pattern '{}': {}",
                    module_name, pattern, e
                ))
            })?;
        }

        for (service_name, service) in module.service.iter() {
            if let Some(pattern) = service.ready_on_stdout.as_deref() {
                Regex::new(pattern).map_err(|e| {
                    DevdagError::ConfigError(format!(
                        "service '{}' has invalid ready_on_stdout regex '{}': {}",
                        service_name, pattern, e
                    ))
                })?;
            }
        }
    }
    Ok(())
}
