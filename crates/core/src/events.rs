//! Lifecycle events published while an engine runs
//!
//! Events are broadcast over a `tokio::sync::broadcast` channel so reporters
//! can observe a run without coupling to the engine. Publishing never blocks
//! and is silent when nobody is subscribed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Default channel capacity for an event bus
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Per-task lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskEvent {
    /// An attempt of the task has started
    Started { task_id: String, attempt: u32 },
    /// An attempt failed and the task will be retried after `delay_ms`
    Retrying {
        task_id: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    /// The task passed
    Passed {
        task_id: String,
        duration_ms: u64,
        retry_count: u32,
    },
    /// The task failed after exhausting its attempts
    Failed {
        task_id: String,
        error: String,
        retry_count: u32,
    },
    /// The task was never started
    Skipped { task_id: String, reason: String },
}

impl TaskEvent {
    /// Identifier of the task this event refers to
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Started { task_id, .. }
            | TaskEvent::Retrying { task_id, .. }
            | TaskEvent::Passed { task_id, .. }
            | TaskEvent::Failed { task_id, .. }
            | TaskEvent::Skipped { task_id, .. } => task_id,
        }
    }
}

/// Run-level events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEvent {
    /// A run has started
    Started {
        mode: String,
        total_tasks: usize,
        workers: usize,
    },
    /// A run has finished, successfully or not
    Completed {
        passed: u32,
        failed: u32,
        skipped: u32,
        duration_ms: u64,
    },
}

/// All events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    Task(TaskEvent),
    Run(RunEvent),
}

impl From<TaskEvent> for EngineEvent {
    fn from(event: TaskEvent) -> Self {
        EngineEvent::Task(event)
    }
}

impl From<RunEvent> for EngineEvent {
    fn from(event: RunEvent) -> Self {
        EngineEvent::Run(event)
    }
}

/// An event stamped with the run it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The event itself
    pub event: EngineEvent,
    /// Correlation id shared by every event of one run
    pub run_id: Uuid,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
}

/// Broadcast bus for engine events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    run_id: Uuid,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            run_id: Uuid::new_v4(),
        }
    }

    /// Correlation id stamped on every published event
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: impl Into<EngineEvent>) {
        let envelope = EventEnvelope {
            event: event.into(),
            run_id: self.run_id,
            timestamp: Utc::now(),
        };

        // Sending only fails when there are no receivers
        if self.sender.send(envelope).is_err() {
            trace!("event dropped, no subscribers");
        }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
