#![cfg(test)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::boundary::{ComponentFailure, FailureKind};
use crate::event::{sync_handler, BoxError, EventChannel, Message, SubscribeOptions};
use crate::kernel::component::Component;

// ===== CALL TRACKER =====

/// Shared, ordered log of hook invocations ("init:a", "cleanup:b", ...)
#[derive(Default)]
pub struct CallTracker {
    calls: Mutex<Vec<String>>,
}

impl CallTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.calls.lock().unwrap().push(entry.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Ids passed to `action`, in call order
    pub fn ids_for(&self, action: &str) -> Vec<String> {
        let prefix = format!("{}:", action);
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.calls().iter().filter(|c| *c == entry).count()
    }
}

// ===== MOCK COMPONENT =====

/// Configurable component recording every hook into a [`CallTracker`]
pub struct MockComponent {
    id: String,
    dependencies: Vec<String>,
    tracker: Arc<CallTracker>,
    ready: AtomicBool,
    healthy: AtomicBool,
    /// Number of upcoming `initialize` calls that fail
    init_failures: AtomicU32,
    init_failure_kind: FailureKind,
    init_panics: bool,
    cleanup_fails: bool,
    supports_reset: bool,
    supports_refresh: bool,
    hidden: AtomicBool,
}

impl MockComponent {
    pub fn new(id: &str, tracker: &Arc<CallTracker>) -> Self {
        Self {
            id: id.to_string(),
            dependencies: Vec::new(),
            tracker: Arc::clone(tracker),
            ready: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            init_failures: AtomicU32::new(0),
            init_failure_kind: FailureKind::Unknown,
            init_panics: false,
            cleanup_fails: false,
            supports_reset: false,
            supports_refresh: false,
            hidden: AtomicBool::new(false),
        }
    }

    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.dependencies = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing_init(self, times: u32, kind: FailureKind) -> Self {
        self.init_failures.store(times, Ordering::SeqCst);
        Self { init_failure_kind: kind, ..self }
    }

    pub fn panicking_init(mut self) -> Self {
        self.init_panics = true;
        self
    }

    pub fn failing_cleanup(mut self) -> Self {
        self.cleanup_fails = true;
        self
    }

    pub fn with_reset(mut self) -> Self {
        self.supports_reset = true;
        self
    }

    pub fn with_refresh(mut self) -> Self {
        self.supports_refresh = true;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Component for MockComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn component_type(&self) -> &str {
        "mock"
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn initialize(&self) -> Result<(), BoxError> {
        self.tracker.record(format!("init:{}", self.id));
        if self.init_panics {
            panic!("{} exploded during init", self.id);
        }
        let remaining = self.init_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.init_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ComponentFailure::new(self.init_failure_kind, format!("{} failed to init", self.id)).into());
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), BoxError> {
        self.tracker.record(format!("cleanup:{}", self.id));
        self.ready.store(false, Ordering::SeqCst);
        if self.cleanup_fails {
            return Err(format!("{} failed to clean up", self.id).into());
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_healthy(&self) -> bool {
        self.is_ready() && self.healthy.load(Ordering::SeqCst)
    }

    fn hide(&self) -> bool {
        self.tracker.record(format!("hide:{}", self.id));
        self.hidden.store(true, Ordering::SeqCst);
        true
    }

    async fn refresh(&self) -> Result<bool, BoxError> {
        if !self.supports_refresh {
            return Ok(false);
        }
        self.tracker.record(format!("refresh:{}", self.id));
        Ok(true)
    }

    async fn reset_state(&self) -> Result<bool, BoxError> {
        if !self.supports_reset {
            return Ok(false);
        }
        self.tracker.record(format!("reset:{}", self.id));
        Ok(true)
    }
}

// ===== MESSAGE RECORDER =====

/// Subscribe to `message_type` and collect every delivered message
pub fn record_messages(channel: &EventChannel, message_type: &str) -> Arc<Mutex<Vec<Message>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    channel.subscribe(
        message_type,
        sync_handler(move |message| {
            sink.lock().unwrap().push(message.clone());
            Ok(Value::Null)
        }),
        SubscribeOptions::new(),
    );
    seen
}

/// `payload[key]` of every recorded message, as strings
pub fn payload_strings(messages: &Arc<Mutex<Vec<Message>>>, key: &str) -> Vec<String> {
    messages
        .lock()
        .unwrap()
        .iter()
        .filter_map(|m| m.payload()[key].as_str().map(str::to_string))
        .collect()
}
