// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling per-module `exclude` glob patterns.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Mapping changed paths to the module that owns them.
//!
//! It does **not** know about tasks; it only turns filesystem changes into
//! [`WatchEvent`]s for the process loop.

pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use event_handler::classify_path;
pub use patterns::{build_module_profiles, ModuleWatchProfile};
pub use watcher::{spawn_watcher, WatcherHandle};

/// What the process loop reacts to in watch mode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum WatchEvent {
    /// Sources of the named module changed.
    ModuleChanged(String),
    /// The project config changed; the loop must be restarted.
    ConfigChanged,
    /// Stop watching.
    Shutdown,
}
