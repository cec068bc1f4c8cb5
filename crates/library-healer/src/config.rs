//! Healer configuration: JSON file with defaults, plus environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding [`HealerConfig::debounce_ms`].
pub const DEBOUNCE_ENV: &str = "HEALER_DEBOUNCE_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealerConfig {
    /// Quiet period after the last mark before a batch runs (default: 500ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound on consecutive batches when healing to a fixpoint (default: 64)
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_passes: default_max_passes(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_max_passes() -> usize {
    64
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("{name} must be a whole number of milliseconds, got {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

impl HealerConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load from a file if one is given, otherwise use defaults, then apply
    /// environment overrides.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an environment lookup.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(DEBOUNCE_ENV) {
            self.debounce_ms = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: DEBOUNCE_ENV,
                value,
            })?;
        }
        Ok(self)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
