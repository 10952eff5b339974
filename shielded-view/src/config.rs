//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::tree::{DEFAULT_TREE_DEPTH, MAX_TREE_DEPTH};

const LIVE_QUERY_TIMEOUT_VAR: &str = "SHIELDED_VIEW_LIVE_QUERY_TIMEOUT_MS";
const TREE_DEPTH_VAR: &str = "SHIELDED_VIEW_TREE_DEPTH";

/// Invalid configuration value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be an integer, got {value:?}")]
    NotANumber { var: &'static str, value: String },
    #[error("{var} must be between {min} and {max}, got {value}")]
    OutOfRange {
        var: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for one live auction query during discovery.
    pub live_query_timeout_ms: u64,
    /// Depth of the state commitment tree.
    pub tree_depth: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            live_query_timeout_ms: 5_000,
            tree_depth: DEFAULT_TREE_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through `lookup`, defaulting unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let live_query_timeout_ms = match lookup(LIVE_QUERY_TIMEOUT_VAR) {
            Some(value) => parse(LIVE_QUERY_TIMEOUT_VAR, &value, 1, u64::MAX)?,
            None => defaults.live_query_timeout_ms,
        };

        let tree_depth = match lookup(TREE_DEPTH_VAR) {
            Some(value) => parse(TREE_DEPTH_VAR, &value, 1, MAX_TREE_DEPTH as u64)? as u8,
            None => defaults.tree_depth,
        };

        Ok(Self {
            live_query_timeout_ms,
            tree_depth,
        })
    }

    pub fn live_query_timeout(&self) -> Duration {
        Duration::from_millis(self.live_query_timeout_ms)
    }
}

fn parse(var: &'static str, value: &str, min: u64, max: u64) -> Result<u64, ConfigError> {
    let parsed: u64 = value.trim().parse().map_err(|_| ConfigError::NotANumber {
        var,
        value: value.to_string(),
    })?;
    if !(min..=max).contains(&parsed) {
        return Err(ConfigError::OutOfRange {
            var,
            value: parsed,
            min,
            max,
        });
    }
    Ok(parsed)
}
