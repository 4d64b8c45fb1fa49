// src/dag/discovery.rs

//! Dynamic task discovery.
//!
//! Dependencies are not known up front: each task computes them on demand.
//! Discovery walks them depth-first from a set of roots and emits every new
//! task after its dependencies, so the scheduler can merge the batch in
//! order.

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::dag::task_info::DiscoveredTask;
use crate::errors::{DevdagError, Result, TaskError};
use crate::tasks::{Task, TaskContext, TaskKey};

struct Frame {
    task: Task,
    key: TaskKey,
    deps: std::vec::IntoIter<Task>,
    dep_keys: Vec<TaskKey>,
}

enum Opened {
    Walk(Frame),
    /// Dependency lookup failed; the task is emitted as failed, with no deps.
    Failed(DiscoveredTask),
}

impl Frame {
    async fn open(task: Task, ctx: &TaskContext) -> Opened {
        let key = task.key();
        match task.dependencies(ctx).await {
            Ok(deps) => Opened::Walk(Self {
                task,
                key,
                deps: deps.into_iter(),
                dep_keys: Vec::new(),
            }),
            Err(err) => {
                warn!(task = %key, error = %err, "could not resolve task dependencies");
                let error = TaskError::from(&err);
                Opened::Failed(DiscoveredTask::failed(task, error))
            }
        }
    }
}

/// Discover `roots` and everything they transitively depend on.
///
/// Keys in `known` (already merged into the graph) are referenced but not
/// descended into. A task whose dependencies cannot be computed is emitted
/// as failed and discovery carries on with the other roots. A dependency
/// that leads back to a key on the current path fails the whole discovery
/// with [`DevdagError::DagCycle`].
pub async fn discover(roots: Vec<Task>, ctx: &TaskContext, known: &HashSet<TaskKey>) -> Result<Vec<DiscoveredTask>> {
    let mut emitted: HashSet<TaskKey> = HashSet::new();
    let mut out: Vec<DiscoveredTask> = Vec::new();

    for root in roots {
        let root_key = root.key();
        if known.contains(&root_key) || emitted.contains(&root_key) {
            trace!(task = %root_key, "root already discovered");
            continue;
        }

        let mut stack: Vec<Frame> = Vec::new();
        match Frame::open(root, ctx).await {
            Opened::Walk(frame) => stack.push(frame),
            Opened::Failed(failed) => {
                emitted.insert(failed.key.clone());
                out.push(failed);
                continue;
            }
        }

        while let Some(frame) = stack.last_mut() {
            let Some(dep) = frame.deps.next() else {
                let Some(done) = stack.pop() else { break };
                emitted.insert(done.key.clone());
                out.push(DiscoveredTask::new(done.task, done.dep_keys));
                continue;
            };

            let dep_key = dep.key();
            if !frame.dep_keys.contains(&dep_key) {
                frame.dep_keys.push(dep_key.clone());
            }

            if let Some(pos) = stack.iter().position(|f| f.key == dep_key) {
                let mut path: Vec<&str> = stack[pos..].iter().map(|f| f.key.as_str()).collect();
                path.push(&dep_key);
                return Err(DevdagError::DagCycle(format!(
                    "circular dependency detected: {}",
                    path.join(" -> ")
                )));
            }

            if known.contains(&dep_key) || emitted.contains(&dep_key) {
                continue;
            }

            match Frame::open(dep, ctx).await {
                Opened::Walk(next) => stack.push(next),
                Opened::Failed(failed) => {
                    emitted.insert(failed.key.clone());
                    out.push(failed);
                }
            }
        }
    }

    debug!(discovered = out.len(), "discovery finished");
    Ok(out)
}
