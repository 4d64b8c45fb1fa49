// src/config/mod.rs

//! Project configuration.
//!
//! - [`model`] is the TOML-backed data model.
//! - [`loader`] reads a config file from disk.
//! - [`validate`] checks references and build dependency cycles.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{
    BuildConfig, ModuleConfig, ProjectConfig, ProjectSection, RawProjectConfig, ServiceConfig,
    TestConfig,
};
pub use validate::validate_config;
