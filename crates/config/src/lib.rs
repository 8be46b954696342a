//! Run configuration for taskweave
//!
//! This crate defines the execution modes and the `RunConfig` consumed by the
//! engine, along with layered loading from JSON files and the environment.

pub mod config;
pub mod loader;


pub use config::{ExecutionMode, RunConfig, MAX_WORKERS, MIN_WORKERS};
pub use loader::*;
