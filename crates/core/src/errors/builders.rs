//! Builder methods for creating errors with context

use super::types::{BoxError, Error};
use std::path::PathBuf;
use std::time::Duration;

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a circular dependency error naming the offending task
    #[must_use]
    pub fn circular_dependency(task_id: impl Into<String>) -> Self {
        Error::CircularDependency {
            task_id: task_id.into(),
        }
    }

    /// Create an unknown dependency error
    #[must_use]
    pub fn unknown_dependency(task_id: impl Into<String>, dependency: impl Into<String>) -> Self {
        Error::UnknownDependency {
            task_id: task_id.into(),
            dependency: dependency.into(),
        }
    }

    /// Wrap a setup hook failure
    #[must_use]
    pub fn setup(task_id: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Setup {
            task_id: task_id.into(),
            source: source.into(),
        }
    }

    /// Wrap an execute hook failure
    #[must_use]
    pub fn execute(task_id: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Execute {
            task_id: task_id.into(),
            source: source.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a cancellation error
    #[must_use]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Error::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a file system error
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error was caused by the run being cancelled or timing out
    pub fn is_cancellation(&self) -> bool {
        match self {
            Error::Cancelled { .. } | Error::Timeout { .. } => true,
            Error::Setup { source, .. } | Error::Execute { source, .. } => source
                .downcast_ref::<Error>()
                .is_some_and(Error::is_cancellation),
            _ => false,
        }
    }

    /// Whether this error is raised while building an engine, before any task runs
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::EmptyTaskSet
                | Error::DuplicateTask { .. }
                | Error::UnknownDependency { .. }
                | Error::CircularDependency { .. }
                | Error::UnknownExecutionMode { .. }
                | Error::Configuration { .. }
        )
    }
}
