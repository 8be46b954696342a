use crate::definition::Task;
use crate::executor::EngineShared;
use crate::result::{ExecutionResult, TaskStatus, SKIP_CONTEXT_CANCELED};
use taskweave_core::TaskEvent;
use taskweave_utils::tracing::{task_completed, task_span};
use tracing::{debug, Instrument};

impl EngineShared {
    /// Gate, run and record one task
    ///
    /// A cancelled run skips the task with "context canceled"; unmet
    /// dependencies skip it with `blocked_reason`. Returns the recorded result.
    pub(crate) async fn process(&self, task: &Task, blocked_reason: &str) -> ExecutionResult {
        if self.scope.is_cancelled() {
            return self.skip(task.id(), SKIP_CONTEXT_CANCELED);
        }
        if !self.state.should_run(task) {
            return self.skip(task.id(), blocked_reason);
        }

        let result = self
            .execute_with_retry(task)
            .instrument(task_span(task.id()))
            .await;
        self.finish(result.clone());
        result
    }

    /// Record a task that was never started
    pub(crate) fn skip(&self, task_id: &str, reason: &str) -> ExecutionResult {
        debug!(task_id = %task_id, reason = %reason, "Skipping task");
        let result = ExecutionResult::skipped(task_id, reason);
        self.finish(result.clone());
        result
    }

    /// Publish, store and mark a terminal result, then wake the dispatcher
    fn finish(&self, result: ExecutionResult) {
        let task_id = result.task_id.clone();
        let status = result.status;
        let duration_ms = result.duration.as_millis() as u64;
        let retry_count = result.retry_count;
        let error = result.error_message.clone().unwrap_or_default();
        let reason = result.skip_reason.clone().unwrap_or_default();

        // Subscribers may read results as soon as the event arrives
        self.state.record(result);
        if status == TaskStatus::Passed {
            self.plan.mark_completed(&task_id);
        } else {
            self.plan.mark_failed(&task_id);
        }

        match status {
            TaskStatus::Passed => {
                task_completed(&task_id, duration_ms, true);
                self.events.publish(TaskEvent::Passed {
                    task_id,
                    duration_ms,
                    retry_count,
                });
            }
            TaskStatus::Failed => {
                task_completed(&task_id, duration_ms, false);
                self.events.publish(TaskEvent::Failed {
                    task_id,
                    error,
                    retry_count,
                });
            }
            _ => {
                self.events.publish(TaskEvent::Skipped { task_id, reason });
            }
        }

        self.progress.notify_one();
    }
}
