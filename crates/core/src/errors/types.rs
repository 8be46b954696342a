use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for taskweave operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried by lifecycle failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for taskweave operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An engine was constructed without any tasks
    #[error("no tasks provided")]
    EmptyTaskSet,

    /// Two tasks share the same identifier
    #[error("duplicate task id '{task_id}'")]
    DuplicateTask { task_id: String },

    /// A task depends on an id that is not part of the task set
    #[error("task '{task_id}' depends on unknown task '{dependency}'")]
    UnknownDependency { task_id: String, dependency: String },

    /// The dependency graph contains a cycle
    #[error("circular dependency detected involving task: {task_id}")]
    CircularDependency { task_id: String },

    /// An execution mode string could not be resolved
    #[error("unknown execution mode: {mode}")]
    UnknownExecutionMode { mode: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The setup hook of a task returned an error
    #[error("setup failed: {source}")]
    Setup {
        task_id: String,
        #[source]
        source: BoxError,
    },

    /// The execute hook of a task returned an error
    #[error("execute failed: {source}")]
    Execute {
        task_id: String,
        #[source]
        source: BoxError,
    },

    /// A task was submitted without an execute hook
    #[error("task '{task_id}' has no execute function")]
    MissingExecute { task_id: String },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The run scope was cancelled before the operation finished
    #[error("{operation}: context canceled")]
    Cancelled { operation: String },

    /// A task failed while running in fail-fast mode
    #[error("task failed: {task_id}: {message}")]
    FailFast { task_id: String, message: String },

    /// Graceful shutdown did not finish in time
    #[error("shutdown timeout after {timeout:?}")]
    ShutdownTimeout { timeout: Duration },

    /// An engine may only be run once
    #[error("execution engine has already been run")]
    AlreadyRan,

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}
