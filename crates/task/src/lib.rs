//! Dependency-aware concurrent task execution for taskweave
//!
//! Callers describe units of work as [`Task`]s, optionally depending on one
//! another, and hand them to an [`ExecutionEngine`] together with a
//! [`RunConfig`]. The engine validates the dependency graph, runs the tasks
//! under the configured [`ExecutionMode`] with per-task timeouts and retries,
//! and reports one [`ExecutionResult`] per task plus aggregate [`TestMetrics`].
//!
//! ```no_run
//! use taskweave_task::{ExecutionEngine, RunConfig, Task};
//!
//! # async fn demo() -> taskweave_task::Result<()> {
//! let tasks = vec![
//!     Task::builder("build").execute(|_ctx| async { Ok(()) }).build(),
//!     Task::builder("test")
//!         .depends_on("build")
//!         .max_retries(2)
//!         .execute(|_ctx| async { Ok(()) })
//!         .build(),
//! ];
//!
//! let engine = ExecutionEngine::new(tasks, RunConfig::default())?;
//! let results = engine.run().await?;
//! println!("{}", engine.metrics());
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

pub mod definition;
pub mod executor;
pub mod result;

pub use definition::{HookFuture, Task, TaskBuilder, TaskHook};
pub use executor::{ExecutionEngine, ExecutionPlan, RunScope, TaskContext};
pub use result::{ExecutionResult, TaskStatus, TestMetrics};
pub use taskweave_config::{ExecutionMode, RunConfig};
pub use taskweave_core::{Error, Result};
