//! Task definitions
//!
//! A `Task` is an immutable description of one unit of work: its identity,
//! the tasks that must pass before it may start, its time and retry budget,
//! and up to three lifecycle hooks. Tasks are assembled with `TaskBuilder`;
//! the `execute` hook is required, but its absence is only reported when the
//! task is run.

use crate::executor::TaskContext;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Future returned by a lifecycle hook
pub type HookFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A lifecycle hook: receives the attempt context, resolves to success or an error
pub type TaskHook = Arc<dyn Fn(TaskContext) -> HookFuture + Send + Sync>;

/// Immutable description of a unit of work
#[derive(Clone)]
pub struct Task {
    id: String,
    name: String,
    description: String,
    dependencies: Vec<String>,
    priority: i32,
    timeout: Option<Duration>,
    max_retries: u32,
    setup: Option<TaskHook>,
    execute: Option<TaskHook>,
    teardown: Option<TaskHook>,
}

impl Task {
    /// Start building a task with the given unique id
    pub fn builder(id: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(id)
    }

    /// Unique key of the task
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human readable name, defaults to the id
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Informational description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ids of the tasks that must pass before this one starts
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Informational ordering hint; never used for scheduling
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Per-task timeout, `None` when the engine default applies
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Timeout for one attempt, falling back to `default` when unset
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }

    /// Additional attempts allowed after the first failure
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn setup(&self) -> Option<&TaskHook> {
        self.setup.as_ref()
    }

    pub fn execute(&self) -> Option<&TaskHook> {
        self.execute.as_ref()
    }

    pub fn teardown(&self) -> Option<&TaskHook> {
        self.teardown.as_ref()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("has_setup", &self.setup.is_some())
            .field("has_execute", &self.execute.is_some())
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}

/// Builder for `Task`
#[must_use]
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    /// Create a builder for a task with the given id
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            task: Task {
                name: id.clone(),
                id,
                description: String::new(),
                dependencies: Vec::new(),
                priority: 0,
                timeout: None,
                max_retries: 0,
                setup: None,
                execute: None,
                teardown: None,
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.task.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.task.description = description.into();
        self
    }

    /// Add a dependency; repeated ids are ignored
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.task.dependencies.contains(&id) {
            self.task.dependencies.push(id);
        }
        self
    }

    /// Add several dependencies
    pub fn dependencies<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter().fold(self, |builder, id| builder.depends_on(id))
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.task.priority = priority;
        self
    }

    /// Per-task timeout; a zero duration means "use the engine default"
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.task.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.task.max_retries = retries;
        self
    }

    /// Hook run before `execute`; its failure fails the attempt
    pub fn setup<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.task.setup = Some(into_hook(hook));
        self
    }

    /// The unit of work itself
    pub fn execute<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.task.execute = Some(into_hook(hook));
        self
    }

    /// Hook run after every attempt whose setup succeeded; errors are only logged
    pub fn teardown<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.task.teardown = Some(into_hook(hook));
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

fn into_hook<F, Fut>(hook: F) -> TaskHook
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |ctx: TaskContext| -> HookFuture { Box::pin(hook(ctx)) })
}
