//! Run-level execution strategies

mod parallel;
mod sequential;

use super::EngineShared;
use std::sync::Arc;
use taskweave_config::ExecutionMode;
use taskweave_core::Result;

/// Run every task of the plan under the configured mode
///
/// Only fail-fast mode returns an error for a task failure; the other modes
/// report failures through the recorded results.
pub(crate) async fn execute(shared: &Arc<EngineShared>) -> Result<()> {
    match shared.config.mode {
        ExecutionMode::Sequential => sequential::run(shared, false).await,
        ExecutionMode::FailFast => sequential::run(shared, true).await,
        ExecutionMode::Parallel | ExecutionMode::Comprehensive => {
            parallel::run(Arc::clone(shared)).await
        }
    }
}
