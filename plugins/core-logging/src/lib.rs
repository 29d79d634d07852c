//! # Keel Logging
//!
//! Structured logging for Keel applications. [`init_logging`] installs a
//! `tracing` subscriber (console output in pretty, compact or JSON form,
//! filtered by an [`EnvFilter`](tracing_subscriber::EnvFilter)) and bridges
//! records from the `log` facade, which the kernel itself uses, into it.
//! [`LoggingComponent`] does the same as part of the kernel lifecycle.
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};

pub mod component;
pub mod config;

pub use component::{LoggingComponent, LOGGING_COMPONENT_ID};
pub use config::{LogFormat, LoggingConfig};

static LOGGING_INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {source}")]
    InvalidDirective {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
}

/// Install the global subscriber described by `config`.
///
/// Returns `Ok(false)` without touching anything if logging was already set
/// up, by this function or by someone else.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    let filter = config.env_filter()?;
    if LOGGING_INSTALLED.swap(true, Ordering::SeqCst) {
        log::debug!("Logging already initialized, skipping re-initialization");
        return Ok(false);
    }

    let console = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(config.with_target)
            .with_ansi(config.ansi)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(config.with_target)
            .with_ansi(config.ansi)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_target(config.with_target).boxed(),
    };
    let subscriber = tracing_subscriber::registry().with(console).with(filter);

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        tracing::warn!("A global subscriber is already installed; keeping it: {}", e);
        return Ok(false);
    }
    // bridge log crate
    if let Err(e) = LogTracer::builder().with_max_level(log::LevelFilter::Trace).init() {
        tracing::warn!("`log` records are not bridged; a logger is already set: {}", e);
    }
    Ok(true)
}

#[cfg(test)]
mod tests;
