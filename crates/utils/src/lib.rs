//! Shared utilities for taskweave
//!
//! This crate provides the retry backoff schedule used by the engine and the
//! tracing setup shared by binaries and tests.

pub mod resilience;
pub mod tracing;

pub use resilience::*;
