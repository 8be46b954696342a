mod api;
mod context;
mod execution;
mod graph;
mod plan;
mod state;
mod strategies;

pub use context::{RunScope, TaskContext};
pub use graph::DependencyMap;
pub use plan::ExecutionPlan;

use state::RunState;
use taskweave_config::RunConfig;
use taskweave_core::EventBus;
use taskweave_utils::BackoffPolicy;
use tokio::sync::{watch, Notify};

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Runs a validated task set under one of the execution modes
///
/// An engine owns a single run: build it with [`ExecutionEngine::new`], call
/// [`ExecutionEngine::run`] once, then read results and metrics. The engine is
/// cheap to clone; clones share the same run, which lets one handle call
/// [`ExecutionEngine::stop`] while another is inside `run`.
#[derive(Clone)]
pub struct ExecutionEngine {
    pub(crate) shared: Arc<EngineShared>,
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("run_id", &self.shared.events.run_id())
            .field("mode", &self.shared.config.mode)
            .field("tasks", &self.shared.plan.len())
            .field("running", &*self.shared.running.borrow())
            .finish()
    }
}

/// State shared between the engine handle, the dispatcher and the workers
pub(crate) struct EngineShared {
    pub(crate) config: RunConfig,
    pub(crate) plan: ExecutionPlan,
    pub(crate) scope: RunScope,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) events: EventBus,
    pub(crate) state: RunState,
    /// Signalled whenever a task reaches a terminal status
    pub(crate) progress: Notify,
    pub(crate) running: watch::Sender<bool>,
    pub(crate) started: AtomicBool,
}
