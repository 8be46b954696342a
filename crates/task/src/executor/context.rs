//! Cancellation scopes handed to lifecycle hooks

use std::sync::Arc;
use std::time::Duration;
use taskweave_core::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Run-wide cancellation scope
///
/// Cancelled either explicitly through [`RunScope::cancel`] or implicitly once
/// the global deadline passes. Every [`TaskContext`] of a run is derived from
/// the same scope, so cancelling it reaches all in-flight and future attempts.
#[derive(Debug, Clone)]
pub struct RunScope {
    cancel: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

impl RunScope {
    /// Create a scope that expires after `global_timeout`
    pub fn new(global_timeout: Duration) -> Self {
        Self {
            cancel: Arc::new(watch::Sender::new(false)),
            deadline: deadline_after(global_timeout),
        }
    }

    /// A scope that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self {
            cancel: Arc::new(watch::Sender::new(false)),
            deadline: None,
        }
    }

    /// Cancel the scope; idempotent
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether `cancel` was called or the deadline has passed
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the scope is cancelled
    pub async fn cancelled(&self) {
        let mut flag = self.cancel.subscribe();
        let signalled = async move {
            let _ = flag.wait_for(|cancelled| *cancelled).await.is_ok();
        };

        tokio::select! {
            () = signalled => {}
            () = sleep_until(self.deadline) => {}
        }
    }

    /// Derive the context for one attempt of a task
    ///
    /// The attempt deadline is the earlier of the run deadline and
    /// `now + timeout`.
    pub fn task_context(&self, task_id: &str, attempt: u32, timeout: Duration) -> TaskContext {
        let deadline = match (self.deadline, deadline_after(timeout)) {
            (Some(run), Some(task)) => Some(run.min(task)),
            (run, task) => run.or(task),
        };

        TaskContext {
            task_id: Arc::from(task_id),
            attempt,
            timeout,
            deadline,
            scope: self.clone(),
        }
    }
}

/// Context passed to `setup`, `execute` and `teardown`
///
/// Cancellation is advisory: hooks should watch [`TaskContext::cancelled`]
/// around long awaits. The engine additionally stops awaiting a hook once
/// the context is cancelled.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: Arc<str>,
    attempt: u32,
    timeout: Duration,
    deadline: Option<Instant>,
    scope: RunScope,
}

impl TaskContext {
    /// Context for a hook that must not be affected by run cancellation
    pub(crate) fn detached(task_id: &str, attempt: u32, timeout: Duration) -> Self {
        RunScope::background().task_context(task_id, attempt, timeout)
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Zero-based attempt index
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Budget granted to this attempt
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the run is cancelled or this attempt's deadline passes
    pub async fn cancelled(&self) {
        tokio::select! {
            () = self.scope.cancelled() => {}
            () = sleep_until(self.deadline) => {}
        }
    }

    /// Error describing why `operation` was interrupted
    pub(crate) fn interruption(&self, operation: &str) -> Error {
        if self.scope.is_cancelled() {
            Error::cancelled(operation)
        } else {
            Error::timeout(operation, self.timeout)
        }
    }
}

fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
