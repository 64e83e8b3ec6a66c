//! Runtime configuration.
//!
//! A [`RuntimeConfig`] is read from JSON with one section per layer:
//!
//! ```json
//! {
//!   "rti": { "subtype_max_depth": 100, "subtype_max_iterations": 100000 },
//!   "scheduler": { "stream_flush_batch": 1, "report_unhandled_errors": true }
//! }
//! ```
//!
//! Every field is optional and defaults to the value in
//! [`kestrel_common::limits`]. Unknown fields are rejected so a typo does
//! not silently fall back to a default.

use anyhow::{Context, Result};
use kestrel_async::AsyncConfig;
use kestrel_common::limits;
use kestrel_rti::SubtypeLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub rti: RtiSection,
    pub scheduler: SchedulerSection,
}

/// Budgets for subtype queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RtiSection {
    pub subtype_max_depth: u32,
    pub subtype_max_iterations: u32,
}

impl Default for RtiSection {
    fn default() -> Self {
        Self {
            subtype_max_depth: limits::MAX_SUBTYPE_DEPTH,
            subtype_max_iterations: limits::MAX_SUBTYPE_ITERATIONS,
        }
    }
}

impl RtiSection {
    pub fn limits(&self) -> SubtypeLimits {
        SubtypeLimits {
            max_depth: self.subtype_max_depth,
            max_iterations: self.subtype_max_iterations,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSection {
    pub stream_flush_batch: usize,
    pub report_unhandled_errors: bool,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        let defaults = AsyncConfig::default();
        Self {
            stream_flush_batch: defaults.stream_flush_batch,
            report_unhandled_errors: defaults.report_unhandled_errors,
        }
    }
}

impl SchedulerSection {
    pub fn async_config(&self) -> AsyncConfig {
        AsyncConfig {
            stream_flush_batch: self.stream_flush_batch,
            report_unhandled_errors: self.report_unhandled_errors,
        }
    }
}

impl RuntimeConfig {
    fn validate(self) -> Result<Self, ConfigError> {
        if self.rti.subtype_max_depth == 0 {
            return Err(ConfigError::Zero {
                field: "rti.subtype_max_depth",
            });
        }
        if self.rti.subtype_max_iterations == 0 {
            return Err(ConfigError::Zero {
                field: "rti.subtype_max_iterations",
            });
        }
        if self.scheduler.stream_flush_batch == 0 {
            return Err(ConfigError::Zero {
                field: "scheduler.stream_flush_batch",
            });
        }
        Ok(self)
    }
}

pub fn parse_config(source: &str) -> Result<RuntimeConfig, ConfigError> {
    let config: RuntimeConfig = serde_json::from_str(source)?;
    config.validate()
}

pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read runtime config: {}", path.display()))?;
    parse_config(&source)
        .with_context(|| format!("failed to parse runtime config: {}", path.display()))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
