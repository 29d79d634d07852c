use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::LoggingError;

/// Output format of the console layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human friendly
    Pretty,
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, e.g. `info` or `keel_core=debug,warn`
    pub level: String,
    pub format: LogFormat,
    /// Let `RUST_LOG` override `level` when set
    pub respect_env: bool,
    pub with_target: bool,
    /// Colored output; ignored by the JSON format
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            respect_env: true,
            with_target: true,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Build the filter: `RUST_LOG` if allowed and set, otherwise `level`.
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if self.respect_env {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        EnvFilter::try_new(&self.level).map_err(|source| LoggingError::InvalidDirective {
            directive: self.level.clone(),
            source,
        })
    }
}
