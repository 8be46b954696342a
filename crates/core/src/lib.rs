//! Core errors and lifecycle events shared by the taskweave crates.
//!
//! ## Key Components
//!
//! - **`errors`**: Defines the primary `Error` enum and `Result` type alias,
//!   centralizing every failure mode of plan construction, task execution,
//!   and configuration loading.
//! - **`events`**: Lifecycle events and the broadcast `EventBus` that reporters
//!   subscribe to while a run is in flight.

pub mod errors;
pub mod events;

pub use self::{
    errors::{BoxError, Error, Result, ResultExt},
    events::{EngineEvent, EventBus, EventEnvelope, RunEvent, TaskEvent},
};
