use super::state::{RunState, RunningGuard};
use super::{strategies, EngineShared, ExecutionEngine, ExecutionPlan, RunScope};
use crate::definition::Task;
use crate::result::{ExecutionResult, TaskStatus, TestMetrics};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskweave_config::{ExecutionMode, RunConfig};
use taskweave_core::{Error, EventBus, EventEnvelope, Result, RunEvent};
use taskweave_utils::tracing::run_span;
use taskweave_utils::BackoffPolicy;
use tokio::sync::{broadcast, watch, Notify};
use tracing::{debug, info, Instrument};
use uuid::Uuid;

impl ExecutionEngine {
    /// Validate the task set and prepare a run
    ///
    /// The worker count is clamped to the supported range. The global timeout
    /// starts counting here.
    pub fn new(tasks: Vec<Task>, config: RunConfig) -> Result<Self> {
        let config = config.normalized();
        let plan = ExecutionPlan::build(tasks)?;
        let state = RunState::new(plan.tasks().map(Task::id));

        debug!(
            mode = %config.mode,
            workers = config.max_workers,
            tasks = plan.len(),
            "Execution engine created"
        );

        Ok(Self {
            shared: Arc::new(EngineShared {
                scope: RunScope::new(config.global_timeout),
                backoff: BackoffPolicy::new(config.retry_base_delay, config.retry_max_delay),
                events: EventBus::default(),
                progress: Notify::new(),
                running: watch::Sender::new(false),
                started: AtomicBool::new(false),
                state,
                plan,
                config,
            }),
        })
    }

    /// Like [`ExecutionEngine::new`], resolving the mode from its name
    pub fn with_mode_name(tasks: Vec<Task>, mode: &str, config: RunConfig) -> Result<Self> {
        let mode = ExecutionMode::from_str(mode)?;
        Self::new(tasks, RunConfig { mode, ..config })
    }

    /// Run every task to a terminal status
    ///
    /// Returns the results in completion order. Fail-fast mode returns an
    /// error for the first failed task instead; its partial results remain
    /// available through [`ExecutionEngine::results`]. An engine runs once.
    pub async fn run(&self) -> Result<Vec<ExecutionResult>> {
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyRan);
        }

        let shared = &self.shared;
        let _running = RunningGuard::new(&shared.running);
        let clock = Instant::now();
        let span = run_span(shared.config.mode.as_str(), shared.plan.len());

        async {
            let workers = if shared.config.mode.is_concurrent() {
                shared.config.effective_workers()
            } else {
                1
            };
            info!(
                mode = %shared.config.mode,
                workers,
                tasks = shared.plan.len(),
                "Starting run"
            );
            if let Ok(levels) = shared.plan.execution_levels() {
                debug!(levels = levels.len(), ?levels, "Execution levels");
            }
            shared.events.publish(RunEvent::Started {
                mode: shared.config.mode.to_string(),
                total_tasks: shared.plan.len(),
                workers,
            });

            let outcome = strategies::execute(shared).await;

            let metrics = shared.state.metrics();
            let duration_ms = clock.elapsed().as_millis() as u64;
            info!(%metrics, duration_ms, "Run finished");
            shared.events.publish(RunEvent::Completed {
                passed: metrics.passed,
                failed: metrics.failed,
                skipped: metrics.skipped,
                duration_ms,
            });

            outcome
        }
        .instrument(span)
        .await?;

        Ok(self.results())
    }

    /// Cancel the run and wait up to `timeout` for it to wind down
    ///
    /// Returns immediately when no run is in progress.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        info!(timeout_ms = timeout.as_millis() as u64, "Stopping execution engine");
        self.shared.scope.cancel();

        let mut running = self.shared.running.subscribe();
        let stopped = async move { running.wait_for(|running| !*running).await.is_ok() };

        match tokio::time::timeout(timeout, stopped).await {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::ShutdownTimeout { timeout }),
        }
    }

    /// Snapshot of the counters, safe to call while running
    pub fn metrics(&self) -> TestMetrics {
        self.shared.state.metrics()
    }

    /// Results recorded so far, in completion order
    pub fn results(&self) -> Vec<ExecutionResult> {
        self.shared.state.results()
    }

    /// Current status of a task, `None` for unknown ids
    pub fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.shared.state.status_of(task_id)
    }

    /// Receive lifecycle events of this engine's run
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.shared.events.subscribe()
    }

    pub fn run_id(&self) -> Uuid {
        self.shared.events.run_id()
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.shared.plan
    }

    pub fn config(&self) -> &RunConfig {
        &self.shared.config
    }

    pub fn is_running(&self) -> bool {
        *self.shared.running.borrow()
    }
}
