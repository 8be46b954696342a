//! Per-task outcomes and aggregate metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskweave_core::Error;

/// Skip reason used when a dependency failed or was itself skipped
pub const SKIP_DEPENDENCIES_FAILED: &str = "dependencies failed";

/// Skip reason used when a worker receives a task whose dependencies are not complete
pub const SKIP_DEPENDENCIES_NOT_MET: &str = "dependencies not met";

/// Skip reason used when the run was cancelled before the task could start
pub const SKIP_CONTEXT_CANCELED: &str = "context canceled";

/// Lifecycle status of a task within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
    Retrying,
}

impl TaskStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Passed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Passed => "passed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Retrying => "retrying",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one task in one run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub task_id: String,
    pub status: TaskStatus,
    /// The last error of a failed task
    #[serde(skip)]
    pub error: Option<Arc<Error>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Number of retry attempts taken
    pub retry_count: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl ExecutionResult {
    pub(crate) fn passed(
        task_id: &str,
        retry_count: u32,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Passed,
            error: None,
            error_message: None,
            retry_count,
            start_time,
            end_time: Utc::now(),
            duration,
            skip_reason: None,
        }
    }

    pub(crate) fn failed(
        task_id: &str,
        error: Error,
        retry_count: u32,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Failed,
            error_message: Some(error.to_string()),
            error: Some(Arc::new(error)),
            retry_count,
            start_time,
            end_time: Utc::now(),
            duration,
            skip_reason: None,
        }
    }

    pub(crate) fn skipped(task_id: &str, reason: &str) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Skipped,
            error: None,
            error_message: None,
            retry_count: 0,
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
            skip_reason: Some(reason.to_string()),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == TaskStatus::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TaskStatus::Skipped
    }
}

/// Snapshot of run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMetrics {
    /// Number of tasks submitted
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Retry attempts taken across all tasks
    pub retries: u32,
}

impl TestMetrics {
    /// Tasks that have reached a terminal status
    pub fn finished(&self) -> u32 {
        self.passed + self.failed + self.skipped
    }

    /// Every submitted task passed
    pub fn is_success(&self) -> bool {
        self.passed == self.total && self.failed == 0 && self.skipped == 0
    }
}

impl fmt::Display for TestMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tests: {} total, {} passed, {} failed, {} skipped (retries: {})",
            self.total, self.passed, self.failed, self.skipped, self.retries
        )
    }
}

/// Lock-free counters updated while a run is in flight
#[derive(Debug, Default)]
pub(crate) struct MetricsCounters {
    total: AtomicU32,
    passed: AtomicU32,
    failed: AtomicU32,
    skipped: AtomicU32,
    retries: AtomicU32,
}

impl MetricsCounters {
    pub(crate) fn new(total: usize) -> Self {
        let counters = Self::default();
        counters
            .total
            .store(u32::try_from(total).unwrap_or(u32::MAX), Ordering::Relaxed);
        counters
    }

    pub(crate) fn record(&self, status: TaskStatus) {
        let counter = match status {
            TaskStatus::Passed => &self.passed,
            TaskStatus::Failed => &self.failed,
            TaskStatus::Skipped => &self.skipped,
            _ => return,
        };
        counter.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn snapshot(&self) -> TestMetrics {
        TestMetrics {
            total: self.total.load(Ordering::Acquire),
            passed: self.passed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
            retries: self.retries.load(Ordering::Acquire),
        }
    }
}
