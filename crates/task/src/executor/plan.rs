use super::graph::{self, DependencyMap};
use crate::definition::Task;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use taskweave_core::{Error, Result};
use tracing::debug;

#[derive(Debug, Default)]
struct PlanState {
    completed: HashSet<String>,
    failed: HashSet<String>,
}

/// Validated dependency graph of a task set
///
/// Built once per engine and read-mostly afterwards: the only mutation is the
/// engine recording which tasks completed or failed. Readiness queries take a
/// read lock so they stay consistent with concurrent marks.
#[derive(Debug)]
pub struct ExecutionPlan {
    tasks: IndexMap<String, Task>,
    dependencies: DependencyMap,
    state: RwLock<PlanState>,
}

impl ExecutionPlan {
    /// Build and validate a plan
    ///
    /// Fails on an empty task set, a duplicate id, a dependency on an id that
    /// is not in the set, or a dependency cycle. No partial plan is produced.
    pub fn build(tasks: Vec<Task>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(Error::EmptyTaskSet);
        }

        let mut by_id = IndexMap::with_capacity(tasks.len());
        for task in tasks {
            let id = task.id().to_string();
            if by_id.contains_key(&id) {
                return Err(Error::DuplicateTask { task_id: id });
            }
            by_id.insert(id, task);
        }

        let mut dependencies = DependencyMap::with_capacity(by_id.len());
        for (id, task) in &by_id {
            if let Some(missing) = task
                .dependencies()
                .iter()
                .find(|dep| !by_id.contains_key(dep.as_str()))
            {
                return Err(Error::unknown_dependency(id.as_str(), missing.as_str()));
            }
            dependencies.insert(id.clone(), task.dependencies().to_vec());
        }

        if let Some(task_id) = graph::find_cycle(&dependencies) {
            return Err(Error::circular_dependency(task_id));
        }

        debug!(tasks = by_id.len(), "Execution plan validated");

        Ok(Self {
            tasks: by_id,
            dependencies,
            state: RwLock::new(PlanState::default()),
        })
    }

    /// Number of tasks in the plan
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Always false for a built plan
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in submission order
    pub fn tasks(&self) -> impl ExactSizeIterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn dependencies_of(&self, id: &str) -> Option<&[String]> {
        self.dependencies.get(id).map(Vec::as_slice)
    }

    /// Static topological order; dependencies always precede dependents
    pub fn execution_order(&self) -> Result<Vec<String>> {
        graph::topological_order(&self.dependencies)
    }

    /// Topological levels; every task's dependencies sit in earlier levels
    pub fn execution_levels(&self) -> Result<Vec<Vec<String>>> {
        graph::levels(&self.dependencies)
    }

    /// Tasks not yet finished whose dependencies have all completed
    pub fn ready_tasks(&self) -> Vec<String> {
        let state = self.state.read();
        self.dependencies
            .iter()
            .filter(|(id, _)| !state.completed.contains(*id) && !state.failed.contains(*id))
            .filter(|(_, deps)| {
                deps.iter()
                    .all(|dep| state.completed.contains(dep) && !state.failed.contains(dep))
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Tasks not yet finished that can never run because a dependency failed
    pub fn blocked_tasks(&self) -> Vec<String> {
        let state = self.state.read();
        self.dependencies
            .iter()
            .filter(|(id, _)| !state.completed.contains(*id) && !state.failed.contains(*id))
            .filter(|(_, deps)| deps.iter().any(|dep| state.failed.contains(dep)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn mark_completed(&self, id: &str) {
        let mut state = self.state.write();
        if !state.completed.contains(id) {
            state.completed.insert(id.to_string());
        }
    }

    /// Record that a task did not complete, including skips
    pub fn mark_failed(&self, id: &str) {
        let mut state = self.state.write();
        if !state.failed.contains(id) {
            state.failed.insert(id.to_string());
        }
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.state.read().completed.contains(id)
    }

    pub fn is_failed(&self, id: &str) -> bool {
        self.state.read().failed.contains(id)
    }

    /// Whether every task has been marked completed or failed
    pub fn is_finished(&self) -> bool {
        let state = self.state.read();
        self.tasks
            .keys()
            .all(|id| state.completed.contains(id) || state.failed.contains(id))
    }
}
