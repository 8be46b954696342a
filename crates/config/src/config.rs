//! Run configuration for the execution engine
//!
//! A `RunConfig` is supplied once per run and never mutated by the engine.
//! Values outside the supported worker range are clamped, not rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use taskweave_core::Error;

/// Smallest worker pool the engine will run with
pub const MIN_WORKERS: usize = 1;

/// Largest worker pool the engine will run with
pub const MAX_WORKERS: usize = 100;

const DEFAULT_MAX_WORKERS: usize = 10;
const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_millis(20);

/// Run-level policy governing concurrency and failure propagation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// One task at a time in topological order
    Sequential,
    /// Ready tasks are dispatched to a bounded worker pool
    #[default]
    Parallel,
    /// Sequential, stopping at the first failed task
    FailFast,
    /// Same wiring as `Parallel`, best effort through every failure
    Comprehensive,
}

impl ExecutionMode {
    /// Canonical string form of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::FailFast => "fail-fast",
            ExecutionMode::Comprehensive => "comprehensive",
        }
    }

    /// Whether the mode dispatches work to a worker pool
    pub fn is_concurrent(&self) -> bool {
        matches!(self, ExecutionMode::Parallel | ExecutionMode::Comprehensive)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "parallel" => Ok(ExecutionMode::Parallel),
            "fail-fast" | "failfast" | "fail_fast" => Ok(ExecutionMode::FailFast),
            "comprehensive" => Ok(ExecutionMode::Comprehensive),
            _ => Err(Error::UnknownExecutionMode {
                mode: s.to_string(),
            }),
        }
    }
}

/// Caller supplied configuration for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Execution mode for the whole run
    pub mode: ExecutionMode,

    /// Size of the worker pool, clamped to `MIN_WORKERS..=MAX_WORKERS`
    pub max_workers: usize,

    /// Wall-clock budget for the entire run
    #[serde(rename = "global_timeout_ms", with = "duration_ms")]
    pub global_timeout: Duration,

    /// Per-task budget used when a task does not set its own timeout
    #[serde(rename = "test_timeout_ms", with = "duration_ms")]
    pub test_timeout: Duration,

    /// When false every task gets exactly one attempt
    pub enable_retry: bool,

    /// Base delay of the exponential retry backoff
    #[serde(rename = "retry_base_delay_ms", with = "duration_ms")]
    pub retry_base_delay: Duration,

    /// Upper bound on a single backoff sleep
    #[serde(rename = "retry_max_delay_ms", with = "duration_ms")]
    pub retry_max_delay: Duration,

    /// How long the dispatcher waits before polling for ready tasks again
    #[serde(rename = "dispatch_interval_ms", with = "duration_ms")]
    pub dispatch_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_workers: DEFAULT_MAX_WORKERS,
            global_timeout: DEFAULT_GLOBAL_TIMEOUT,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            enable_retry: true,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
            dispatch_interval: DEFAULT_DISPATCH_INTERVAL,
        }
    }
}

impl RunConfig {
    /// Create a default configuration for the given mode
    pub fn with_mode(mode: ExecutionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Set the worker pool size (clamped when normalized)
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Set the global run timeout
    pub fn global_timeout(mut self, timeout: Duration) -> Self {
        self.global_timeout = timeout;
        self
    }

    /// Set the default per-task timeout
    pub fn test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    /// Enable or disable retries
    pub fn enable_retry(mut self, enabled: bool) -> Self {
        self.enable_retry = enabled;
        self
    }

    /// Set the base delay of the retry backoff
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Worker count clamped to the supported range
    pub fn effective_workers(&self) -> usize {
        self.max_workers.clamp(MIN_WORKERS, MAX_WORKERS)
    }

    /// Return a copy with every bounded value brought into range
    pub fn normalized(mut self) -> Self {
        let workers = self.effective_workers();
        if workers != self.max_workers {
            tracing::debug!(
                requested = self.max_workers,
                effective = workers,
                "Clamping worker count"
            );
            self.max_workers = workers;
        }
        if self.retry_max_delay < self.retry_base_delay {
            self.retry_max_delay = self.retry_base_delay;
        }
        self
    }
}

/// Serde helpers storing a `Duration` as integer milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
