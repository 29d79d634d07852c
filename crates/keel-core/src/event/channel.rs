use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::runtime::Handle;

use crate::config::ChannelConfig;
use crate::event::error::{EventChannelError, Result};
use crate::event::history::{DiagnosticBuffer, HistoryEntry};
use crate::event::message::{Message, MessageOptions};
use crate::event::middleware::{ListenerInfo, Middleware};
use crate::event::subscription::{
    HandlerResult, MessageHandler, SubscribeOptions, Subscription, SubscriptionHandle, SubscriptionId,
    SubscriptionInfo,
};
use crate::event::{topics, BoxError, Priority};
use crate::utils::{lock, panic_message};

/// Counters kept by the channel since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub published: u64,
    /// Listener invocations
    pub delivered: u64,
    pub listener_failures: u64,
    pub timeouts: u64,
    pub validation_failures: u64,
    pub middleware_failures: u64,
}

//--------------------------------------------------
// ChannelInner (shared state, wrapped by EventChannel)
//--------------------------------------------------

#[derive(Default)]
struct ChannelState {
    /// Per type, kept sorted by priority descending then insertion order
    subscriptions: HashMap<String, Vec<Arc<Subscription>>>,
    middleware: Vec<Arc<dyn Middleware>>,
    next_id: SubscriptionId,
}

pub(crate) struct ChannelInner {
    state: Mutex<ChannelState>,
    history: Mutex<DiagnosticBuffer>,
    stats: Mutex<ChannelStats>,
    config: ChannelConfig,
}

impl ChannelInner {
    pub(crate) fn remove_subscription(&self, message_type: &str, id: SubscriptionId) -> bool {
        let mut state = lock(&self.state);
        let Some(subs) = state.subscriptions.get_mut(message_type) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() < before;
        if subs.is_empty() {
            state.subscriptions.remove(message_type);
        }
        removed
    }
}

/// Snapshot taken at the start of a publish; later subscribe/unsubscribe and
/// middleware changes do not affect a publish already in flight.
struct Prepared {
    message: Arc<Message>,
    listeners: Vec<Arc<Subscription>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

//--------------------------------------------------
// EventChannel (Public API)
//--------------------------------------------------

/// Message router with ordered delivery, middleware and listener isolation.
///
/// Cloning is cheap and every clone addresses the same channel. Channels are
/// constructed explicitly and handed to the components that need them; there
/// is no process-wide instance.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<ChannelInner>,
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        let listener_count: usize = state.subscriptions.values().map(|v| v.len()).sum();
        f.debug_struct("EventChannel")
            .field("message_types", &state.subscriptions.len())
            .field("listener_count", &listener_count)
            .field("middleware_count", &state.middleware.len())
            .finish()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    pub fn with_config(config: ChannelConfig) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                state: Mutex::new(ChannelState { next_id: 1, ..Default::default() }),
                history: Mutex::new(DiagnosticBuffer::new(config.history_capacity)),
                stats: Mutex::new(ChannelStats::default()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    // --- Subscriptions ---

    /// Register a listener for `message_type`.
    ///
    /// Never fails; an empty type is accepted with a warning but such a
    /// listener can never fire, since publishing an empty type is rejected.
    pub fn subscribe(
        &self,
        message_type: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
        options: SubscribeOptions,
    ) -> SubscriptionHandle {
        let message_type = message_type.into();
        if message_type.trim().is_empty() {
            log::warn!("Subscribing to an empty message type; the listener will never be invoked");
        }
        let mut state = lock(&self.inner.state);
        let id = state.next_id;
        state.next_id += 1;
        let priority = options.priority;
        let subscription = Arc::new(Subscription::new(id, message_type.clone(), handler, options));
        let subs = state.subscriptions.entry(message_type.clone()).or_default();
        // After every listener of equal or higher priority
        let position = subs.iter().position(|s| s.priority() < priority).unwrap_or(subs.len());
        subs.insert(position, subscription);
        log::trace!("Subscribed listener {} to '{}' at {:?}", id, message_type, priority);
        SubscriptionHandle::new(id, message_type, Arc::downgrade(&self.inner))
    }

    /// Remove a listener by id. Returns false if it was not registered.
    pub fn unsubscribe(&self, message_type: &str, id: SubscriptionId) -> bool {
        self.inner.remove_subscription(message_type, id)
    }

    /// Remove every listener for `message_type`, returning how many were removed
    pub fn unsubscribe_all(&self, message_type: &str) -> usize {
        lock(&self.inner.state)
            .subscriptions
            .remove(message_type)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    pub fn listener_count(&self, message_type: &str) -> usize {
        lock(&self.inner.state).subscriptions.get(message_type).map_or(0, |subs| subs.len())
    }

    pub fn has_listeners(&self, message_type: &str) -> bool {
        self.listener_count(message_type) > 0
    }

    /// Message types with at least one listener, sorted
    pub fn message_types(&self) -> Vec<String> {
        let mut types: Vec<String> = lock(&self.inner.state).subscriptions.keys().cloned().collect();
        types.sort();
        types
    }

    /// Listeners for `message_type` in delivery order
    pub fn subscriptions(&self, message_type: &str) -> Vec<SubscriptionInfo> {
        lock(&self.inner.state)
            .subscriptions
            .get(message_type)
            .map(|subs| subs.iter().map(|s| s.info()).collect())
            .unwrap_or_default()
    }

    /// Remove every listener and middleware
    pub fn clear(&self) {
        let mut state = lock(&self.inner.state);
        state.subscriptions.clear();
        state.middleware.clear();
    }

    // --- Middleware ---

    /// Append a middleware; stages run in registration order
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        log::debug!("Adding middleware '{}'", middleware.name());
        lock(&self.inner.state).middleware.push(middleware);
    }

    /// Remove every middleware registered under `name`
    pub fn remove_middleware(&self, name: &str) -> bool {
        let mut state = lock(&self.inner.state);
        let before = state.middleware.len();
        state.middleware.retain(|m| m.name() != name);
        state.middleware.len() < before
    }

    pub fn middleware_names(&self) -> Vec<String> {
        lock(&self.inner.state).middleware.iter().map(|m| m.name().to_string()).collect()
    }

    // --- Diagnostics ---

    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.inner.history).snapshot()
    }

    pub fn clear_history(&self) {
        lock(&self.inner.history).clear();
    }

    pub fn stats(&self) -> ChannelStats {
        *lock(&self.inner.stats)
    }

    // --- Publishing ---

    /// Publish `payload` under `message_type` with default metadata.
    ///
    /// Resolves with the results of the listeners that succeeded, in delivery
    /// order. Rejected input resolves with no results.
    pub async fn publish<P: Serialize>(&self, message_type: &str, payload: P) -> Result<Vec<Value>> {
        self.publish_with(message_type, payload, MessageOptions::default()).await
    }

    pub async fn publish_with<P: Serialize>(
        &self,
        message_type: &str,
        payload: P,
        options: MessageOptions,
    ) -> Result<Vec<Value>> {
        match self.build_message(message_type, payload, options) {
            Some(message) => self.publish_message(message).await,
            None => Ok(Vec::new()),
        }
    }

    /// Publish a prebuilt message.
    ///
    /// Listeners run one at a time. A listener failure is contained unless
    /// the message is [`Priority::Critical`], in which case delivery stops and
    /// the failure is returned.
    pub async fn publish_message(&self, message: Message) -> Result<Vec<Value>> {
        let Some(Prepared { message, listeners, middleware }) = self.prepare(message) else {
            return Ok(Vec::new());
        };
        let mut results = Vec::with_capacity(listeners.len());
        let mut invoked = 0;
        let mut failures = 0;

        for sub in listeners {
            if !self.begin_listener(&sub, &message, &middleware) {
                continue;
            }
            invoked += 1;
            let outcome = self.invoke(&sub, Arc::clone(&message)).await;
            self.finish_listener(&sub, &message, &middleware, &outcome);
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    failures += 1;
                    if message.priority().is_top_tier() {
                        log::error!(
                            "Listener {} failed on critical message '{}'; escalating: {}",
                            sub.id, message.message_type(), err
                        );
                        self.complete(&message, &middleware, None, invoked, failures);
                        return Err(err);
                    }
                    self.report_listener_failure(&message, &sub, &err);
                }
            }
        }

        self.complete(&message, &middleware, Some(&results), invoked, failures);
        Ok(results)
    }

    /// Publish without awaiting asynchronous work.
    ///
    /// Listeners run in the same order as [`publish`](Self::publish). Listeners
    /// subscribed with `async_mode`, and listeners that do not complete on
    /// their first poll, are handed to the runtime and their results are not
    /// collected.
    pub fn publish_sync<P: Serialize>(&self, message_type: &str, payload: P) -> Result<Vec<Value>> {
        self.publish_sync_with(message_type, payload, MessageOptions::default())
    }

    pub fn publish_sync_with<P: Serialize>(
        &self,
        message_type: &str,
        payload: P,
        options: MessageOptions,
    ) -> Result<Vec<Value>> {
        match self.build_message(message_type, payload, options) {
            Some(message) => self.publish_sync_message(message),
            None => Ok(Vec::new()),
        }
    }

    pub fn publish_sync_message(&self, message: Message) -> Result<Vec<Value>> {
        let Some(Prepared { message, listeners, middleware }) = self.prepare(message) else {
            return Ok(Vec::new());
        };
        let mut results = Vec::with_capacity(listeners.len());
        let mut invoked = 0;
        let mut failures = 0;

        for sub in listeners {
            if !self.begin_listener(&sub, &message, &middleware) {
                continue;
            }
            invoked += 1;
            if sub.options.async_mode {
                let channel = self.clone();
                let (task_sub, msg, mw) = (Arc::clone(&sub), Arc::clone(&message), middleware.clone());
                self.detach(&sub, async move {
                    let outcome = channel.invoke(&task_sub, Arc::clone(&msg)).await;
                    channel.settle_detached(&task_sub, &msg, &mw, outcome);
                });
                continue;
            }

            let mut call = Self::call(&sub, Arc::clone(&message));
            let Some(result) = call.as_mut().now_or_never() else {
                log::debug!(
                    "Listener {} for '{}' did not complete synchronously; continuing in background",
                    sub.id, message.message_type()
                );
                let channel = self.clone();
                let (task_sub, msg, mw) = (Arc::clone(&sub), Arc::clone(&message), middleware.clone());
                self.detach(&sub, async move {
                    let outcome = channel.settle(&task_sub, call.await);
                    channel.settle_detached(&task_sub, &msg, &mw, outcome);
                });
                continue;
            };

            let outcome = self.settle(&sub, result);
            self.finish_listener(&sub, &message, &middleware, &outcome);
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    failures += 1;
                    if message.priority().is_top_tier() {
                        log::error!(
                            "Listener {} failed on critical message '{}'; escalating: {}",
                            sub.id, message.message_type(), err
                        );
                        self.complete(&message, &middleware, None, invoked, failures);
                        return Err(err);
                    }
                    self.report_listener_failure(&message, &sub, &err);
                }
            }
        }

        self.complete(&message, &middleware, Some(&results), invoked, failures);
        Ok(results)
    }

    // --- Internals ---

    fn build_message<P: Serialize>(&self, message_type: &str, payload: P, options: MessageOptions) -> Option<Message> {
        match serde_json::to_value(payload) {
            Ok(value) => Some(Message::builder(message_type).payload(value).options(options).build()),
            Err(e) => {
                self.record_rejection(EventChannelError::Validation {
                    message_type: message_type.to_string(),
                    reason: format!("payload is not serializable: {}", e),
                });
                None
            }
        }
    }

    fn validate(message: &Message) -> Result<()> {
        if message.message_type().trim().is_empty() {
            return Err(EventChannelError::Validation {
                message_type: message.message_type().to_string(),
                reason: "message type must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn prepare(&self, message: Message) -> Option<Prepared> {
        if let Err(err) = Self::validate(&message) {
            self.record_rejection(err);
            return None;
        }
        let middleware = lock(&self.inner.state).middleware.clone();
        let message = self.run_before_emit(&middleware, message);
        if let Err(err) = Self::validate(&message) {
            self.record_rejection(err);
            return None;
        }
        let listeners = lock(&self.inner.state)
            .subscriptions
            .get(message.message_type())
            .cloned()
            .unwrap_or_default();
        lock(&self.inner.stats).published += 1;
        Some(Prepared { message: Arc::new(message), listeners, middleware })
    }

    fn record_rejection(&self, err: EventChannelError) {
        log::warn!("Skipping delivery: {}", err);
        lock(&self.inner.stats).validation_failures += 1;
        lock(&self.inner.history).push(HistoryEntry {
            message_type: topics::VALIDATION_ERROR.to_string(),
            recorded_at: Utc::now(),
            message: None,
            listeners_invoked: 0,
            failures: 0,
            error: Some(err.to_string()),
        });
    }

    /// Runs one middleware stage, containing errors and panics.
    fn run_stage<T>(
        &self,
        middleware: &dyn Middleware,
        stage: &'static str,
        f: impl FnOnce() -> std::result::Result<T, BoxError>,
    ) -> Option<T> {
        let failure = match std::panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload)),
        };
        let err = EventChannelError::Middleware {
            middleware: middleware.name().to_string(),
            stage,
            message: failure,
        };
        log::warn!("{}", err);
        lock(&self.inner.stats).middleware_failures += 1;
        None
    }

    /// Any failing stage discards every transformation and delivers the
    /// message as published. Later stages still run so their failures are logged.
    fn run_before_emit(&self, middleware: &[Arc<dyn Middleware>], message: Message) -> Message {
        let original = message.clone();
        let mut current = message;
        let mut failed = false;
        for mw in middleware {
            let previous = current.clone();
            current = match self.run_stage(mw.as_ref(), "before_emit", || mw.before_emit(current)) {
                Some(next) => next,
                None => {
                    failed = true;
                    previous
                }
            };
        }
        if failed { original } else { current }
    }

    fn begin_listener(&self, sub: &Arc<Subscription>, message: &Message, middleware: &[Arc<dyn Middleware>]) -> bool {
        if !sub.accepts(message) {
            return false;
        }
        if !sub.claim() {
            // once-listener already fired from a concurrent publish
            return false;
        }
        if sub.options.once {
            self.inner.remove_subscription(&sub.message_type, sub.id);
        }
        if !middleware.is_empty() {
            let info = ListenerInfo::from(sub.as_ref());
            for mw in middleware {
                self.run_stage(mw.as_ref(), "before_listener", || mw.before_listener(message, &info));
            }
        }
        lock(&self.inner.stats).delivered += 1;
        true
    }

    fn finish_listener(
        &self,
        sub: &Subscription,
        message: &Message,
        middleware: &[Arc<dyn Middleware>],
        outcome: &Result<Value>,
    ) {
        sub.record_call();
        if outcome.is_err() {
            lock(&self.inner.stats).listener_failures += 1;
        }
        if middleware.is_empty() {
            return;
        }
        let info = ListenerInfo::from(sub);
        for mw in middleware {
            self.run_stage(mw.as_ref(), "after_listener", || {
                mw.after_listener(message, &info, outcome.as_ref())
            });
        }
    }

    fn complete(
        &self,
        message: &Arc<Message>,
        middleware: &[Arc<dyn Middleware>],
        results: Option<&[Value]>,
        invoked: usize,
        failures: usize,
    ) {
        if let Some(results) = results {
            for mw in middleware {
                self.run_stage(mw.as_ref(), "after_emit", || mw.after_emit(message, results));
            }
        }
        lock(&self.inner.history).push(HistoryEntry {
            message_type: message.message_type().to_string(),
            recorded_at: Utc::now(),
            message: Some(Arc::clone(message)),
            listeners_invoked: invoked,
            failures,
            error: None,
        });
    }

    fn call(sub: &Subscription, message: Arc<Message>) -> BoxFuture<'static, std::thread::Result<HandlerResult>> {
        let handler = Arc::clone(&sub.handler);
        AssertUnwindSafe(async move { handler.handle(message).await })
            .catch_unwind()
            .boxed()
    }

    fn settle(&self, sub: &Subscription, result: std::thread::Result<HandlerResult>) -> Result<Value> {
        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(EventChannelError::Handler {
                message_type: sub.message_type.clone(),
                subscription_id: sub.id,
                message: source.to_string(),
                source: Some(source),
            }),
            Err(payload) => Err(EventChannelError::Handler {
                message_type: sub.message_type.clone(),
                subscription_id: sub.id,
                message: format!("listener panicked: {}", panic_message(payload)),
                source: None,
            }),
        }
    }

    /// Invoke one listener, bounded by its timeout when it has one.
    ///
    /// A timed-out listener is not cancelled: it runs on as a detached task
    /// and its eventual result is discarded.
    async fn invoke(&self, sub: &Subscription, message: Arc<Message>) -> Result<Value> {
        let limit = sub
            .options
            .timeout
            .or_else(|| self.inner.config.default_listener_timeout())
            .filter(|_| Handle::try_current().is_ok());
        let Some(limit) = limit else {
            return self.settle(sub, Self::call(sub, message).await);
        };

        let task = tokio::spawn(Self::call(sub, message));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => self.settle(sub, result),
            Ok(Err(join_err)) => Err(EventChannelError::Handler {
                message_type: sub.message_type.clone(),
                subscription_id: sub.id,
                message: format!("listener task aborted: {}", join_err),
                source: None,
            }),
            Err(_) => {
                lock(&self.inner.stats).timeouts += 1;
                log::warn!(
                    "Listener {} for '{}' exceeded its {:?} timeout",
                    sub.id, sub.message_type, limit
                );
                Err(EventChannelError::Timeout {
                    message_type: sub.message_type.clone(),
                    subscription_id: sub.id,
                    timeout: limit,
                })
            }
        }
    }

    fn detach(&self, sub: &Subscription, task: impl std::future::Future<Output = ()> + Send + 'static) {
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(task);
            }
            Err(_) => log::warn!(
                "No async runtime available; dropping background work of listener {} for '{}'",
                sub.id, sub.message_type
            ),
        }
    }

    fn settle_detached(
        &self,
        sub: &Subscription,
        message: &Message,
        middleware: &[Arc<dyn Middleware>],
        outcome: Result<Value>,
    ) {
        self.finish_listener(sub, message, middleware, &outcome);
        if let Err(err) = outcome {
            self.report_listener_failure(message, sub, &err);
        }
    }

    /// Log a contained listener failure and re-emit it as a
    /// [`topics::LISTENER_ERROR`] message from a separate task.
    fn report_listener_failure(&self, message: &Message, sub: &Subscription, err: &EventChannelError) {
        log::error!(
            "Listener {} ({}) failed handling '{}': {}",
            sub.id,
            sub.options.context.as_deref().unwrap_or("no context"),
            message.message_type(),
            err
        );
        if !self.inner.config.emit_listener_errors || message.message_type() == topics::LISTENER_ERROR {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No async runtime available; listener failure not re-emitted");
            return;
        };
        let error_message = message
            .reply(topics::LISTENER_ERROR)
            .payload(json!({
                "messageType": message.message_type(),
                "messageId": message.id(),
                "subscriptionId": sub.id,
                "context": sub.options.context,
                "timeout": err.is_timeout(),
                "error": err.to_string(),
            }))
            .source("event-channel")
            .priority(Priority::High)
            .build();
        let channel = self.clone();
        runtime.spawn(async move {
            if let Err(e) = channel.publish_message(error_message).await {
                log::error!("Failed to deliver listener error report: {}", e);
            }
        });
    }
}
