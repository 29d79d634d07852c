//! # Keel Event Channel Errors
//!
//! Defines error types specific to the event channel.
//!
//! [`EventChannelError`] covers the three listener-side failure classes
//! (malformed publish input, a listener that failed, a listener that overran
//! its time budget) plus middleware stage failures, which are only ever logged.
use std::time::Duration;

use thiserror::Error;

use crate::event::subscription::SubscriptionId;
use crate::event::BoxError;

#[derive(Debug, Error)]
pub enum EventChannelError {
    /// Publish arguments were rejected; delivery was skipped.
    #[error("Invalid message '{message_type}': {reason}")]
    Validation { message_type: String, reason: String },

    /// A listener returned an error or panicked.
    #[error("Listener {subscription_id} for '{message_type}' failed: {message}")]
    Handler {
        message_type: String,
        subscription_id: SubscriptionId,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A listener did not settle within its declared timeout.
    #[error("Listener {subscription_id} for '{message_type}' timed out after {timeout:?}")]
    Timeout {
        message_type: String,
        subscription_id: SubscriptionId,
        timeout: Duration,
    },

    /// A middleware stage failed. Never propagated to publishers.
    #[error("Middleware '{middleware}' failed during {stage}: {message}")]
    Middleware {
        middleware: String,
        stage: &'static str,
        message: String,
    },
}

impl EventChannelError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, EventChannelError::Timeout { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EventChannelError::Validation { .. })
    }

    /// Subscription the failure belongs to, if it is a listener failure.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        match self {
            EventChannelError::Handler { subscription_id, .. }
            | EventChannelError::Timeout { subscription_id, .. } => Some(*subscription_id),
            _ => None,
        }
    }
}

/// Shorthand for Result with the channel error type
pub type Result<T> = std::result::Result<T, EventChannelError>;
