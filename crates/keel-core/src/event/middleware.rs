use serde::Serialize;
use serde_json::Value;

use crate::event::error::EventChannelError;
use crate::event::message::Message;
use crate::event::subscription::{Subscription, SubscriptionId};
use crate::event::{BoxError, Priority};

/// Listener details exposed to the per-listener middleware stages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerInfo {
    pub subscription_id: SubscriptionId,
    pub message_type: String,
    pub priority: Priority,
    pub context: Option<String>,
}

impl From<&Subscription> for ListenerInfo {
    fn from(sub: &Subscription) -> Self {
        Self {
            subscription_id: sub.id,
            message_type: sub.message_type.clone(),
            priority: sub.options.priority,
            context: sub.options.context.clone(),
        }
    }
}

/// A cross-cutting stage run by the channel around every publish.
///
/// Every stage has a pass-through default, so implementors only override
/// what they need. A failing stage is logged and skipped; it never stops
/// delivery.
pub trait Middleware: Send + Sync {
    /// Name used to remove the middleware and in log output
    fn name(&self) -> &str;

    /// May replace the message before any listener sees it
    fn before_emit(&self, message: Message) -> Result<Message, BoxError> {
        Ok(message)
    }

    /// Runs once all listeners settled, with the collected results
    fn after_emit(&self, _message: &Message, _results: &[Value]) -> Result<(), BoxError> {
        Ok(())
    }

    fn before_listener(&self, _message: &Message, _listener: &ListenerInfo) -> Result<(), BoxError> {
        Ok(())
    }

    fn after_listener(
        &self,
        _message: &Message,
        _listener: &ListenerInfo,
        _outcome: Result<&Value, &EventChannelError>,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Traces every message and listener outcome through the `log` facade.
#[derive(Debug, Default, Clone)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    fn before_emit(&self, message: Message) -> Result<Message, BoxError> {
        log::debug!(
            "Publishing '{}' ({}) priority={:?} source={}",
            message.message_type(),
            message.id(),
            message.priority(),
            message.source().unwrap_or("<none>")
        );
        Ok(message)
    }

    fn after_emit(&self, message: &Message, results: &[Value]) -> Result<(), BoxError> {
        log::debug!("Published '{}' ({}): {} result(s)", message.message_type(), message.id(), results.len());
        Ok(())
    }

    fn before_listener(&self, message: &Message, listener: &ListenerInfo) -> Result<(), BoxError> {
        log::trace!("Delivering '{}' to listener {}", message.message_type(), listener.subscription_id);
        Ok(())
    }

    fn after_listener(
        &self,
        message: &Message,
        listener: &ListenerInfo,
        outcome: Result<&Value, &EventChannelError>,
    ) -> Result<(), BoxError> {
        match outcome {
            Ok(_) => log::trace!("Listener {} handled '{}'", listener.subscription_id, message.message_type()),
            Err(e) => log::debug!("Listener {} failed on '{}': {}", listener.subscription_id, message.message_type(), e),
        }
        Ok(())
    }
}
