#![forbid(unsafe_code)]

//! Engine configuration as data.
//!
//! [`EngineConfig`] groups every tunable of the engine and its HTTP backend.
//! With the `config` feature it loads from TOML or JSON; every field has a
//! default, so a partial file only overrides what it names.
//!
//! ```toml
//! [drag]
//! drag_threshold = 4
//!
//! [resync.retry]
//! max_retries = 2
//! backoff = { kind = "exponential", base_ms = 100, max_ms = 2000 }
//!
//! [http]
//! base_url = "https://api.example.test/v1"
//! timeout_ms = 5000
//! ```

#[cfg(feature = "config")]
use std::path::Path;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use ordo_core::DragConfig;
use thiserror::Error;

use crate::retry::{BackoffStrategy, RetryPolicy};

/// Everything the engine can be tuned with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    /// Drag recognition.
    pub drag: DragConfig,
    /// Reload behavior.
    pub resync: ResyncConfig,
    /// HTTP backend settings.
    pub http: HttpConfig,
}

/// Reload behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ResyncConfig {
    /// Retry policy for the container-list call (default: no retries).
    pub retry: RetryPolicy,
}

/// HTTP backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct HttpConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Per-request timeout in milliseconds (default: 10000).
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            timeout_ms: 10_000,
        }
    }
}

/// Errors loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{format} parse error: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl EngineConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse {
            format: "TOML",
            message: e.to_string(),
        })
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::Parse {
            format: "JSON",
            message: e.to_string(),
        })
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load a file, choosing the format by extension (`.json`, else TOML).
    #[cfg(feature = "config")]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_toml_file(path)
        }
    }

    /// Check every parameter is within range.
    ///
    /// An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.drag.drag_threshold == 0 {
            errors.push("drag.drag_threshold must be > 0".into());
        }

        let retry = &self.resync.retry;
        if retry.max_retries > 10 {
            errors.push(format!(
                "resync.retry.max_retries must be <= 10, got {}",
                retry.max_retries
            ));
        }
        match retry.backoff {
            BackoffStrategy::Fixed { .. } => {}
            BackoffStrategy::Exponential { base_ms, max_ms }
            | BackoffStrategy::Linear { base_ms, max_ms } => {
                if max_ms < base_ms {
                    errors.push(format!(
                        "resync.retry.backoff.max_ms ({max_ms}) must be >= base_ms ({base_ms})"
                    ));
                }
            }
        }

        let url = self.http.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!(
                "http.base_url must start with http:// or https://, got {url:?}"
            ));
        }
        if self.http.timeout_ms == 0 {
            errors.push("http.timeout_ms must be > 0".into());
        }

        errors
    }

    /// `self` if valid, otherwise every problem found.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}
