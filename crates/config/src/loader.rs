//! Layered loading of `RunConfig`
//!
//! Precedence, lowest to highest: built-in defaults, a JSON config file, and
//! `TASKWEAVE_*` environment variables.

use crate::config::{ExecutionMode, RunConfig};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use taskweave_core::{Error, Result, ResultExt};

/// Environment variable selecting the execution mode
pub const ENV_MODE: &str = "TASKWEAVE_MODE";
/// Environment variable setting the worker pool size
pub const ENV_MAX_WORKERS: &str = "TASKWEAVE_MAX_WORKERS";
/// Environment variable setting the global timeout in milliseconds
pub const ENV_GLOBAL_TIMEOUT_MS: &str = "TASKWEAVE_GLOBAL_TIMEOUT_MS";
/// Environment variable setting the default per-task timeout in milliseconds
pub const ENV_TEST_TIMEOUT_MS: &str = "TASKWEAVE_TEST_TIMEOUT_MS";
/// Environment variable enabling or disabling retries
pub const ENV_ENABLE_RETRY: &str = "TASKWEAVE_ENABLE_RETRY";

impl RunConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(content: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(content)?;
        Ok(config.normalized())
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read", e))?;
        tracing::debug!(path = %path.display(), "Loaded run configuration file");
        Self::from_json(&content)
    }

    /// Apply `TASKWEAVE_*` environment variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(mode) = env_value(ENV_MODE) {
            self.mode = ExecutionMode::from_str(&mode)?;
        }

        if let Some(workers) = env_value(ENV_MAX_WORKERS) {
            self.max_workers = workers
                .parse::<usize>()
                .with_context(|| format!("invalid {ENV_MAX_WORKERS} '{workers}'"))?;
        }

        if let Some(timeout) = env_value(ENV_GLOBAL_TIMEOUT_MS) {
            self.global_timeout = parse_millis(ENV_GLOBAL_TIMEOUT_MS, &timeout)?;
        }

        if let Some(timeout) = env_value(ENV_TEST_TIMEOUT_MS) {
            self.test_timeout = parse_millis(ENV_TEST_TIMEOUT_MS, &timeout)?;
        }

        if let Some(enabled) = env_value(ENV_ENABLE_RETRY) {
            self.enable_retry = match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(Error::configuration(format!(
                        "invalid {ENV_ENABLE_RETRY} '{other}'"
                    )))
                }
            };
        }

        Ok(self.normalized())
    }

    /// Load defaults, then the optional file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides()
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .with_context(|| format!("invalid {name} '{value}'"))
}
