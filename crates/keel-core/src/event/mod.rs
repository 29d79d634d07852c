//! # Keel Event Channel
//!
//! Typed publish/subscribe routing for kernel components.
//!
//! A [`Message`] is published on an [`EventChannel`] and delivered to every
//! [`Subscription`](subscription::Subscription) registered for its type, one
//! listener at a time, highest [`Priority`] first and registration order as the
//! tie-break. An ordered chain of [`Middleware`] stages observes (and may
//! transform) messages before emission and around every listener call.
//!
//! Listener failures are contained: they are logged, reported to the
//! middleware chain and re-emitted as a [`topics::LISTENER_ERROR`] message.
//! Only messages published at [`Priority::Critical`] surface a listener
//! failure back to the publisher.
pub mod channel;
pub mod error;
pub mod history;
pub mod message;
pub mod middleware;
pub mod subscription;
pub mod topics;

use serde::{Deserialize, Serialize};

/// Boxed error type returned by listeners, middleware and component hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Message and subscription priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Lowest priority, processed last
    Low = 0,
    /// Normal priority, processed in the middle
    #[default]
    Normal = 1,
    /// High priority, processed first
    High = 2,
    /// Critical priority; listener failures propagate to the publisher
    Critical = 3,
}

impl Priority {
    /// Whether this is the top tier, where listener failures are escalated.
    pub fn is_top_tier(self) -> bool {
        self == Priority::Critical
    }
}

/// Re-export important types
pub use channel::{ChannelStats, EventChannel};
pub use error::{EventChannelError, Result};
pub use history::HistoryEntry;
pub use message::{Message, MessageBuilder, MessageMetadata, MessageOptions};
pub use middleware::{ListenerInfo, LoggingMiddleware, Middleware};
pub use subscription::{
    handler_fn, sync_handler, HandlerResult, MessageFilter, MessageHandler, SubscribeOptions,
    SubscriptionHandle, SubscriptionId, SubscriptionInfo,
};

// Test module declaration
#[cfg(test)]
mod tests;
