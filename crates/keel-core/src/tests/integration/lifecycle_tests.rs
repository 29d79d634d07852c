#![cfg(test)]

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::config::KernelConfig;
use crate::event::{sync_handler, topics, SubscribeOptions};
use crate::kernel::bootstrap::Kernel;
use crate::kernel::record::ComponentStatus;
use crate::tests::common::{CallTracker, MockComponent};

/// Records "type:id" for every lifecycle message
fn observe(kernel: &Kernel, types: &[&'static str]) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for message_type in types.iter().copied() {
        let sink = Arc::clone(&log);
        kernel.channel().subscribe(
            message_type,
            sync_handler(move |message| {
                let id = message.payload()["id"].as_str().unwrap_or("*").to_string();
                sink.lock().unwrap().push(format!("{}:{}", message.message_type(), id));
                Ok(Value::Null)
            }),
            SubscribeOptions::new(),
        );
    }
    log
}

#[tokio::test]
async fn test_application_boot_and_shutdown() {
    let kernel = Kernel::from_config(KernelConfig::default()).unwrap();
    let tracker = CallTracker::new();
    let log = observe(
        &kernel,
        &[topics::COMPONENT_READY, topics::LIFECYCLE_INITIALIZED, topics::COMPONENT_DESTROYED],
    );

    // Registration order deliberately differs from dependency order
    kernel
        .register(MockComponent::new("cart", &tracker).depends_on(&["catalog", "store"]).build())
        .await
        .unwrap();
    kernel
        .register(MockComponent::new("catalog", &tracker).depends_on(&["store"]).build())
        .await
        .unwrap();
    kernel.register(MockComponent::new("store", &tracker).build()).await.unwrap();

    assert_eq!(kernel.start().await.unwrap(), vec!["store", "catalog", "cart"]);
    let report = kernel.coordinator().check_health().await;
    assert!(report.all_healthy());

    let shutdown = kernel.shutdown().await;
    assert_eq!(shutdown.destroyed, vec!["cart", "catalog", "store"]);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "component.ready:store",
            "component.ready:catalog",
            "component.ready:cart",
            "lifecycle.initialized:*",
            "component.destroyed:cart",
            "component.destroyed:catalog",
            "component.destroyed:store",
        ]
    );
    assert_eq!(tracker.ids_for("init"), vec!["store", "catalog", "cart"]);
}

#[tokio::test]
async fn test_partial_failure_leaves_dependents_pending() {
    let kernel = Kernel::default();
    let tracker = CallTracker::new();
    kernel.register(MockComponent::new("store", &tracker).build()).await.unwrap();
    kernel
        .register(
            MockComponent::new("catalog", &tracker)
                .depends_on(&["store"])
                .failing_init(1, crate::boundary::FailureKind::Network)
                .build(),
        )
        .await
        .unwrap();
    kernel
        .register(MockComponent::new("cart", &tracker).depends_on(&["catalog"]).build())
        .await
        .unwrap();

    assert!(kernel.start().await.is_err());

    let statuses: Vec<(String, ComponentStatus)> = kernel
        .coordinator()
        .records()
        .await
        .into_iter()
        .map(|r| (r.id, r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("store".to_string(), ComponentStatus::Ready),
            ("catalog".to_string(), ComponentStatus::Error),
            ("cart".to_string(), ComponentStatus::Registered),
        ]
    );

    // Shutdown still tears everything down
    let report = kernel.shutdown().await;
    assert_eq!(report.destroyed.len(), 3);
    assert!(kernel
        .coordinator()
        .records()
        .await
        .iter()
        .all(|r| r.status == ComponentStatus::Destroyed));
}

#[tokio::test]
async fn test_dependents_wait_for_failed_dependency() {
    let kernel = Kernel::default();
    let tracker = CallTracker::new();
    let log = observe(&kernel, &[topics::LIFECYCLE_INITIALIZED]);
    kernel.register(MockComponent::new("store", &tracker).build()).await.unwrap();
    kernel
        .register(
            MockComponent::new("catalog", &tracker)
                .depends_on(&["store"])
                .failing_init(1, crate::boundary::FailureKind::Network)
                .build(),
        )
        .await
        .unwrap();
    kernel
        .register(MockComponent::new("cart", &tracker).depends_on(&["catalog"]).build())
        .await
        .unwrap();
    kernel
        .register(MockComponent::new("banner", &tracker).build())
        .await
        .unwrap();
    assert!(kernel.coordinator().initialize_all().await.is_err());

    // A second pass must not start "cart" on top of the failed "catalog"
    let second = kernel.coordinator().initialize_all().await.unwrap();
    assert_eq!(second, vec!["banner"]);
    assert_eq!(tracker.count("init:cart"), 0);
    assert_eq!(kernel.coordinator().status_of("cart").await, Some(ComponentStatus::Registered));
    assert_eq!(kernel.coordinator().pending().await, vec!["cart"]);
    assert_eq!(log.lock().unwrap().len(), 1, "Only the completed pass reports");

    // Once the dependency recovers, the dependent follows
    kernel.coordinator().reinitialize("catalog").await.unwrap();
    assert_eq!(kernel.coordinator().initialize_all().await.unwrap(), vec!["cart"]);
    assert_eq!(kernel.coordinator().status_of("cart").await, Some(ComponentStatus::Ready));
    kernel.shutdown().await;
}

#[tokio::test]
async fn test_circular_dependencies_block_start() {
    let kernel = Kernel::default();
    let tracker = CallTracker::new();
    kernel
        .register(MockComponent::new("a", &tracker).depends_on(&["b"]).build())
        .await
        .unwrap();
    kernel
        .register(MockComponent::new("b", &tracker).depends_on(&["a"]).build())
        .await
        .unwrap();

    let err = kernel.start().await.unwrap_err();

    assert!(err.is_cycle());
    assert!(err.to_string().contains("Circular dependency"));
    assert!(tracker.calls().is_empty());
    assert!(!kernel.coordinator().validate_dependencies("a").await.is_valid());
}
