#![cfg(test)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::event::{
    handler_fn, sync_handler, topics, EventChannel, Message, Middleware, Priority, SubscribeOptions,
};
use crate::kernel::bootstrap::Kernel;
use crate::tests::common::{record_messages, CallTracker, MockComponent};
use crate::BoxError;

#[tokio::test]
async fn test_request_reply_shares_correlation() {
    let channel = EventChannel::new();
    let responder = channel.clone();
    channel.subscribe(
        "pricing.request",
        handler_fn(move |request: Arc<Message>| {
            let channel = responder.clone();
            async move {
                let sku = request.payload()["sku"].as_str().unwrap_or_default().to_string();
                let reply = request
                    .reply("pricing.quote")
                    .payload(json!({ "sku": sku, "price": 42 }))
                    .source("pricing")
                    .build();
                channel.publish_message(reply).await?;
                Ok::<Value, BoxError>(json!("quoted"))
            }
        }),
        SubscribeOptions::new().context("pricing"),
    );
    let quotes = record_messages(&channel, "pricing.quote");

    let request = Message::builder("pricing.request")
        .payload(json!({ "sku": "tea" }))
        .source("cart")
        .build();
    let request_id = request.id().to_string();
    let results = channel.publish_message(request).await.unwrap();

    assert_eq!(results, vec![json!("quoted")]);
    let quotes = quotes.lock().unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].correlation_id(), Some(request_id.as_str()));
    assert_eq!(quotes[0].payload()["price"], 42);
    assert_eq!(quotes[0].source(), Some("pricing"));
}

/// Counts the lifecycle traffic a kernel produces
struct Audit(Arc<Mutex<Vec<String>>>);

impl Middleware for Audit {
    fn name(&self) -> &str {
        "audit"
    }

    fn before_emit(&self, message: Message) -> Result<Message, BoxError> {
        self.0.lock().unwrap().push(message.message_type().to_string());
        Ok(message.with_tag("audited"))
    }
}

#[tokio::test]
async fn test_middleware_sees_kernel_traffic() {
    let kernel = Kernel::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    kernel.channel().add_middleware(Arc::new(Audit(Arc::clone(&seen))));
    let ready = record_messages(kernel.channel(), topics::COMPONENT_READY);
    let tracker = CallTracker::new();

    kernel.register(MockComponent::new("a", &tracker).build()).await.unwrap();
    kernel.start().await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            topics::COMPONENT_REGISTERED,
            topics::COMPONENT_INITIALIZING,
            topics::COMPONENT_READY,
            topics::LIFECYCLE_INITIALIZED,
        ]
    );
    assert!(ready.lock().unwrap()[0].has_tag("audited"));
    kernel.shutdown().await;
}

#[tokio::test]
async fn test_listener_failures_feed_the_boundary() {
    let kernel = Kernel::default();
    let tracker = CallTracker::new();
    let guarded = kernel
        .register(MockComponent::new("sensor", &tracker).build())
        .await
        .unwrap()
        .unwrap();
    kernel.start().await.unwrap();

    // The component's own listener misbehaves
    kernel.channel().subscribe(
        "sensor.sample",
        sync_handler(|_| Err("calibration lost".into())),
        SubscribeOptions::new().context("sensor"),
    );

    // Bridge channel.listener_error into the boundary for the owning component
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    kernel.channel().subscribe(
        topics::LISTENER_ERROR,
        sync_handler(move |message| {
            let _ = tx.send(message.clone());
            Ok(Value::Null)
        }),
        SubscribeOptions::new(),
    );

    let results = kernel.channel().publish("sensor.sample", json!({ "v": 3 })).await.unwrap();
    assert!(results.is_empty(), "The failed listener contributes no result");

    let report = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.payload()["context"], "sensor");
    let failure: BoxError = report.payload()["error"].as_str().unwrap_or_default().into();
    guarded
        .report_error(&*failure, crate::boundary::ErrorPhase::Listener.into())
        .await;

    let history = kernel.boundary().get_component_error_history("sensor");
    assert_eq!(history.len(), 1);
    assert!(history[0].error.contains("calibration lost"));
    assert_eq!(kernel.channel().stats().listener_failures, 1);
    kernel.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_listener_times_out_without_blocking_others() {
    let channel = EventChannel::new();
    let finished = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&finished);
    channel.subscribe(
        "report.build",
        handler_fn(move |_| {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                *flag.lock().unwrap() = true;
                Ok(Value::Null)
            }
        }),
        SubscribeOptions::new().priority(Priority::High).timeout(Duration::from_millis(100)),
    );
    channel.subscribe("report.build", sync_handler(|_| Ok(json!("fast"))), SubscribeOptions::new());

    let results = channel.publish("report.build", json!({})).await.unwrap();

    assert_eq!(results, vec![json!("fast")]);
    assert_eq!(channel.stats().timeouts, 1);
    assert!(!*finished.lock().unwrap());

    // The timed-out work still completes in the background
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(*finished.lock().unwrap());
}
