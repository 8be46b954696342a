//! Sequential and fail-fast execution

use crate::executor::EngineShared;
use crate::result::{SKIP_CONTEXT_CANCELED, SKIP_DEPENDENCIES_FAILED};
use taskweave_core::{Error, Result};
use tracing::{info, warn};

/// Walk the topological order one task at a time
///
/// With `fail_fast` the walk stops at the first failed task and returns
/// `Error::FailFast`; remaining tasks get no result. Otherwise a failure only
/// skips the tasks that depend on it.
pub(crate) async fn run(shared: &EngineShared, fail_fast: bool) -> Result<()> {
    let order = shared.plan.execution_order()?;

    for (index, task_id) in order.iter().enumerate() {
        if shared.scope.is_cancelled() {
            warn!(remaining = order.len() - index, "Run cancelled");
            if fail_fast {
                return Err(Error::cancelled("run"));
            }
            for remaining in &order[index..] {
                shared.skip(remaining, SKIP_CONTEXT_CANCELED);
            }
            return Ok(());
        }

        let Some(task) = shared.plan.task(task_id) else {
            continue;
        };

        let result = shared.process(task, SKIP_DEPENDENCIES_FAILED).await;
        if fail_fast && result.is_failed() {
            let message = result.error_message.unwrap_or_default();
            info!(task_id = %task_id, "Stopping after first failure");
            return Err(Error::FailFast {
                task_id: task_id.clone(),
                message,
            });
        }
    }

    Ok(())
}
