// src/dag/graph.rs

//! Adjacency of the task graph, grown as discovery merges new keys.

use std::collections::{HashMap, HashSet};

use crate::tasks::TaskKey;

#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    deps: HashMap<TaskKey, Vec<TaskKey>>,
    dependents: HashMap<TaskKey, Vec<TaskKey>>,
}

impl DagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key` with its direct dependencies. Returns `false` (and
    /// changes nothing) if the key is already present.
    pub fn insert(&mut self, key: &str, deps: &[TaskKey]) -> bool {
        if self.deps.contains_key(key) {
            return false;
        }
        self.deps.insert(key.to_string(), deps.to_vec());
        for dep in deps {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .push(key.to_string());
        }
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.deps.contains_key(key)
    }

    pub fn dependencies_of(&self, key: &str) -> &[TaskKey] {
        self.deps.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependents_of(&self, key: &str) -> &[TaskKey] {
        self.dependents.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of keys that (transitively) wait on `key`.
    pub fn downstream_count(&self, key: &str) -> usize {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = self.dependents_of(key).iter().map(String::as_str).collect();
        while let Some(k) = stack.pop() {
            if seen.insert(k) {
                stack.extend(self.dependents_of(k).iter().map(String::as_str));
            }
        }
        seen.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.deps.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn clear(&mut self) {
        self.deps.clear();
        self.dependents.clear();
    }
}
