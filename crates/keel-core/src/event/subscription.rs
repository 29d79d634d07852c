use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::event::channel::ChannelInner;
use crate::event::message::Message;
use crate::event::{BoxError, Priority};

/// Type for subscription identifiers
pub type SubscriptionId = u64;

/// What a listener hands back to the publisher
pub type HandlerResult = std::result::Result<Value, BoxError>;

/// Predicate deciding whether a listener sees a given message
pub type MessageFilter = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// Asynchronous message handler trait
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Arc<Message>) -> HandlerResult;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, message: Arc<Message>) -> HandlerResult {
        (self.f)(message).await
    }
}

struct SyncHandler<F> {
    f: F,
}

#[async_trait]
impl<F> MessageHandler for SyncHandler<F>
where
    F: Fn(&Message) -> HandlerResult + Send + Sync + 'static,
{
    async fn handle(&self, message: Arc<Message>) -> HandlerResult {
        (self.f)(&message)
    }
}

/// Wrap an async closure as a handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Helper function to create synchronous handlers that are compatible with async system
pub fn sync_handler<F>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(&Message) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(SyncHandler { f })
}

/// Options accepted by [`EventChannel::subscribe`](crate::event::EventChannel::subscribe)
#[derive(Clone, Default)]
pub struct SubscribeOptions {
    pub priority: Priority,
    /// Remove the subscription after its first invocation
    pub once: bool,
    /// Not awaited by `publish_sync`; spawned instead
    pub async_mode: bool,
    pub filter: Option<MessageFilter>,
    /// Stop waiting for the listener after this long
    pub timeout: Option<Duration>,
    /// Label identifying the listener's owner in logs and error reports
    pub context: Option<String>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn async_mode(mut self) -> Self {
        self.async_mode = true;
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Debug for SubscribeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("async_mode", &self.async_mode)
            .field("has_filter", &self.filter.is_some())
            .field("timeout", &self.timeout)
            .field("context", &self.context)
            .finish()
    }
}

/// A registered listener. Owned by the channel; shared with in-flight
/// publishes through an `Arc`.
pub struct Subscription {
    pub(crate) id: SubscriptionId,
    pub(crate) message_type: String,
    pub(crate) handler: Arc<dyn MessageHandler>,
    pub(crate) options: SubscribeOptions,
    call_count: AtomicU64,
    last_called: Mutex<Option<DateTime<Utc>>>,
    fired: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        message_type: String,
        handler: Arc<dyn MessageHandler>,
        options: SubscribeOptions,
    ) -> Self {
        Self {
            id,
            message_type,
            handler,
            options,
            call_count: AtomicU64::new(0),
            last_called: Mutex::new(None),
            fired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.options.priority
    }

    pub(crate) fn accepts(&self, message: &Message) -> bool {
        self.options.filter.as_ref().is_none_or(|filter| filter(message))
    }

    /// Claims the single invocation of a `once` subscription. Always true for
    /// regular subscriptions.
    pub(crate) fn claim(&self) -> bool {
        if !self.options.once {
            return true;
        }
        !self.fired.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn record_call(&self) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.last_called.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id,
            message_type: self.message_type.clone(),
            priority: self.options.priority,
            once: self.options.once,
            async_mode: self.options.async_mode,
            has_filter: self.options.filter.is_some(),
            timeout_ms: self.options.timeout.map(|t| t.as_millis() as u64),
            context: self.options.context.clone(),
            call_count: self.call_count.load(Ordering::SeqCst),
            last_called: *self.last_called.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("message_type", &self.message_type)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a subscription's bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub message_type: String,
    pub priority: Priority,
    pub once: bool,
    pub async_mode: bool,
    pub has_filter: bool,
    pub timeout_ms: Option<u64>,
    pub context: Option<String>,
    pub call_count: u64,
    pub last_called: Option<DateTime<Utc>>,
}

/// Returned by `subscribe`; removes the subscription when asked to.
///
/// Dropping the handle does not unsubscribe.
#[derive(Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    message_type: String,
    channel: Weak<ChannelInner>,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: SubscriptionId, message_type: String, channel: Weak<ChannelInner>) -> Self {
        Self { id, message_type, channel }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Remove the subscription. Returns false if it was already gone or the
    /// channel no longer exists.
    pub fn unsubscribe(&self) -> bool {
        match self.channel.upgrade() {
            Some(inner) => inner.remove_subscription(&self.message_type, self.id),
            None => false,
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("message_type", &self.message_type)
            .finish()
    }
}
