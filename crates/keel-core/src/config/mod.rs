//! # Keel Kernel Configuration
//!
//! [`KernelConfig`] groups the tunables of the three kernel subsystems. Every
//! section and field has a default, so partial documents are accepted.
//! Configuration can be parsed from JSON, TOML (`toml-config` feature) or YAML
//! (`yaml-config` feature); the format of a file is picked from its extension.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::constants;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown or unsupported config format for path: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to parse {format} config: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Event channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Entries kept in the in-memory diagnostic buffer; 0 disables it
    pub history_capacity: usize,
    /// Timeout applied to listeners that declare none
    pub default_listener_timeout_ms: Option<u64>,
    /// Re-emit listener failures as `channel.listener_error` messages
    pub emit_listener_errors: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            history_capacity: constants::DEFAULT_HISTORY_CAPACITY,
            default_listener_timeout_ms: None,
            emit_listener_errors: true,
        }
    }
}

impl ChannelConfig {
    pub fn default_listener_timeout(&self) -> Option<Duration> {
        self.default_listener_timeout_ms.map(Duration::from_millis)
    }
}

/// Lifecycle coordinator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub health_check_interval_ms: u64,
    /// Emit a health report even when no component is registered
    pub emit_empty_health_reports: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: constants::DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            emit_empty_health_reports: false,
        }
    }
}

impl LifecycleConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

/// Priorities of the built-in recovery strategies; higher runs first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyPriorities {
    pub reinitialize: i32,
    pub reset_state: i32,
    pub refresh: i32,
}

impl Default for StrategyPriorities {
    fn default() -> Self {
        Self {
            reinitialize: constants::REINITIALIZE_STRATEGY_PRIORITY,
            reset_state: constants::RESET_STATE_STRATEGY_PRIORITY,
            refresh: constants::REFRESH_STRATEGY_PRIORITY,
        }
    }
}

/// Error boundary settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Isolate once a component's lifetime error count exceeds this
    pub max_errors_per_component: u64,
    pub error_window_ms: u64,
    /// Isolate once errors inside the trailing window exceed this
    pub max_errors_per_window: usize,
    /// Attempt one recovery per handled runtime error
    pub auto_recover: bool,
    pub max_history_per_component: usize,
    pub strategy_priorities: StrategyPriorities,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            max_errors_per_component: constants::DEFAULT_MAX_ERRORS_PER_COMPONENT,
            error_window_ms: constants::DEFAULT_ERROR_WINDOW_MS,
            max_errors_per_window: constants::DEFAULT_MAX_ERRORS_PER_WINDOW,
            auto_recover: true,
            max_history_per_component: constants::DEFAULT_MAX_HISTORY_PER_COMPONENT,
            strategy_priorities: StrategyPriorities::default(),
        }
    }
}

impl BoundaryConfig {
    pub fn error_window(&self) -> Duration {
        Duration::from_millis(self.error_window_ms)
    }
}

/// Complete kernel configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub channel: ChannelConfig,
    pub lifecycle: LifecycleConfig,
    pub boundary: BoundaryConfig,
}

impl KernelConfig {
    /// Parse a configuration document in the given format
    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: KernelConfig = match format {
            ConfigFormat::Json => serde_json::from_str(text).map_err(|e| ConfigError::Parse {
                format: "json",
                message: e.to_string(),
            })?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
                format: "yaml",
                message: e.to_string(),
            })?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(text).map_err(|e| ConfigError::Parse {
                format: "toml",
                message: e.to_string(),
            })?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, detecting the format from its extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loading kernel config from {} ({})", path.display(), format.extension());
        Self::parse(&text, format)
    }

    /// Reject values the kernel cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lifecycle.health_check_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "lifecycle.health_check_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.boundary.error_window_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "boundary.error_window_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.channel.default_listener_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "channel.default_listener_timeout_ms",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
