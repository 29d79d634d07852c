use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use keel_core::{BoxError, Component};

use crate::config::LoggingConfig;
use crate::init_logging;

pub const LOGGING_COMPONENT_ID: &str = "core-logging";

/// Installs the process-wide logging subscriber when the kernel initializes
/// it. Register it without dependencies so it settles before anything that
/// logs.
#[derive(Debug, Default)]
pub struct LoggingComponent {
    config: LoggingConfig,
    ready: AtomicBool,
}

impl LoggingComponent {
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config,
            ready: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}

#[async_trait]
impl Component for LoggingComponent {
    fn id(&self) -> &str {
        LOGGING_COMPONENT_ID
    }

    fn name(&self) -> &str {
        "Core Logging"
    }

    fn component_type(&self) -> &str {
        "logging"
    }

    async fn initialize(&self) -> Result<(), BoxError> {
        if init_logging(&self.config)? {
            log::info!("Logging initialized ({:?}, level '{}')", self.config.format, self.config.level);
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), BoxError> {
        // The global subscriber cannot be uninstalled; it stays for the
        // rest of the process.
        log::info!("Shutting down core logging component");
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
