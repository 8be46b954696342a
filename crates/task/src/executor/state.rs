use crate::definition::Task;
use crate::result::{ExecutionResult, MetricsCounters, TaskStatus, TestMetrics};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct DependencyGate {
    completed: HashSet<String>,
    failed: HashSet<String>,
}

/// Mutable bookkeeping of one run
///
/// The gate sets mirror the plan's marks and decide whether a task may start;
/// results are appended under a mutex and counted with atomics so metrics can
/// be read mid-run.
#[derive(Debug)]
pub(crate) struct RunState {
    results: Mutex<Vec<ExecutionResult>>,
    gate: RwLock<DependencyGate>,
    statuses: RwLock<HashMap<String, TaskStatus>>,
    counters: MetricsCounters,
}

impl RunState {
    pub(crate) fn new<'a>(task_ids: impl ExactSizeIterator<Item = &'a str>) -> Self {
        let total = task_ids.len();
        let statuses: HashMap<String, TaskStatus> = task_ids
            .map(|id| (id.to_string(), TaskStatus::Pending))
            .collect();

        Self {
            results: Mutex::new(Vec::with_capacity(total)),
            gate: RwLock::new(DependencyGate::default()),
            statuses: RwLock::new(statuses),
            counters: MetricsCounters::new(total),
        }
    }

    /// Every dependency completed and none failed
    pub(crate) fn should_run(&self, task: &Task) -> bool {
        let gate = self.gate.read();
        task.dependencies()
            .iter()
            .all(|dep| gate.completed.contains(dep) && !gate.failed.contains(dep))
    }

    /// Store a terminal result and open or close the gate for dependents
    pub(crate) fn record(&self, result: ExecutionResult) {
        let task_id = result.task_id.clone();
        let status = result.status;

        self.results.lock().push(result);
        self.counters.record(status);
        self.statuses.write().insert(task_id.clone(), status);

        let mut gate = self.gate.write();
        if status == TaskStatus::Passed {
            gate.completed.insert(task_id);
        } else {
            gate.failed.insert(task_id);
        }
    }

    pub(crate) fn set_status(&self, task_id: &str, status: TaskStatus) {
        if let Some(current) = self.statuses.write().get_mut(task_id) {
            if !current.is_terminal() {
                *current = status;
            }
        }
    }

    pub(crate) fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.statuses.read().get(task_id).copied()
    }

    pub(crate) fn record_retry(&self) {
        self.counters.record_retry();
    }

    pub(crate) fn results(&self) -> Vec<ExecutionResult> {
        self.results.lock().clone()
    }

    pub(crate) fn metrics(&self) -> TestMetrics {
        self.counters.snapshot()
    }
}

/// Holds the engine's running flag high for the lifetime of a run
pub(crate) struct RunningGuard<'a> {
    flag: &'a watch::Sender<bool>,
}

impl<'a> RunningGuard<'a> {
    pub(crate) fn new(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self { flag }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}
