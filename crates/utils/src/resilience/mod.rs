//! Resilience patterns for retrying transient failures.
//!
//! ## Key Components
//!
//! - **`backoff`**: Exponential backoff with a signed random jitter so that
//!   many tasks failing together do not retry in lockstep.

pub mod backoff;

pub use backoff::BackoffPolicy;
