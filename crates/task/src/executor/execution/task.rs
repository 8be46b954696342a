use crate::definition::{Task, TaskHook};
use crate::executor::{EngineShared, TaskContext};
use crate::result::{ExecutionResult, TaskStatus};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use taskweave_core::{BoxError, Error, Result, TaskEvent};
use tracing::{debug, warn};

impl EngineShared {
    /// Run a task with retries and return its terminal result
    ///
    /// Attempts are `1 + max_retries` when retries are enabled, otherwise one.
    /// A backoff sleep precedes every retry and is cut short by cancellation.
    pub(crate) async fn execute_with_retry(&self, task: &Task) -> ExecutionResult {
        let start_time = Utc::now();
        let clock = Instant::now();
        let attempts = if self.config.enable_retry {
            task.max_retries().saturating_add(1)
        } else {
            1
        };

        let mut last_error: Option<Error> = None;
        let mut retries = 0;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff.delay_for(attempt);
                let error = last_error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                debug!(
                    task_id = %task.id(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying task"
                );
                self.state.set_status(task.id(), TaskStatus::Retrying);
                self.events.publish(TaskEvent::Retrying {
                    task_id: task.id().to_string(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    error,
                });

                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = self.scope.cancelled() => break,
                }

                self.state.record_retry();
                retries = attempt;
            }

            self.state.set_status(task.id(), TaskStatus::Running);
            self.events.publish(TaskEvent::Started {
                task_id: task.id().to_string(),
                attempt,
            });

            match self.run_lifecycle(task, attempt).await {
                Ok(()) => {
                    return ExecutionResult::passed(task.id(), attempt, start_time, clock.elapsed());
                }
                Err(err) => {
                    debug!(task_id = %task.id(), attempt, error = %err, "Attempt failed");
                    let interrupted = err.is_cancellation() && self.scope.is_cancelled();
                    last_error = Some(err);
                    if interrupted {
                        break;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| Error::cancelled(task.id()));
        ExecutionResult::failed(task.id(), error, retries, start_time, clock.elapsed())
    }

    /// One attempt: setup, execute, then teardown if setup succeeded
    async fn run_lifecycle(&self, task: &Task, attempt: u32) -> Result<()> {
        let timeout = task.effective_timeout(self.config.test_timeout);
        let ctx = self.scope.task_context(task.id(), attempt, timeout);

        if let Some(setup) = task.setup() {
            run_hook(setup, ctx.clone(), "setup")
                .await
                .map_err(|source| Error::setup(task.id(), source))?;
        }

        let outcome = match task.execute() {
            Some(execute) => run_hook(execute, ctx, "execute")
                .await
                .map_err(|source| Error::execute(task.id(), source)),
            None => Err(Error::MissingExecute {
                task_id: task.id().to_string(),
            }),
        };

        if let Some(teardown) = task.teardown() {
            // Teardown gets a fresh budget, unaffected by run cancellation
            let ctx = TaskContext::detached(task.id(), attempt, timeout);
            if let Err(err) = run_hook(teardown, ctx, "teardown").await {
                warn!(task_id = %task.id(), attempt, error = %err, "Teardown failed");
            }
        }

        outcome
    }
}

/// Await a hook until it finishes or its context is cancelled
///
/// Panics inside the hook are turned into errors.
async fn run_hook(
    hook: &TaskHook,
    ctx: TaskContext,
    stage: &'static str,
) -> std::result::Result<(), BoxError> {
    let guard = ctx.clone();
    let fut = AssertUnwindSafe(hook(ctx)).catch_unwind();

    tokio::select! {
        biased;
        outcome = fut => match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.into()),
            Err(panic) => Err(anyhow::anyhow!("{stage} panicked: {}", panic_message(&*panic)).into()),
        },
        () = guard.cancelled() => Err(guard.interruption(stage).into()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
