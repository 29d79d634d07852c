#![cfg(test)]

use serde_json::json;

use crate::boundary::{ComponentFailure, ErrorContext, ErrorPhase};
use crate::config::{BoundaryConfig, KernelConfig};
use crate::event::topics;
use crate::kernel::bootstrap::Kernel;
use crate::kernel::record::HealthStatus;
use crate::tests::common::{payload_strings, record_messages, CallTracker, MockComponent};

fn flapping() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "sensor bus reset")
}

#[tokio::test]
async fn test_flapping_component_is_quarantined() {
    let kernel = Kernel::default();
    let tracker = CallTracker::new();
    let sensor = MockComponent::new("sensor", &tracker).build();
    let guarded = kernel.register(sensor.clone()).await.unwrap().unwrap();
    kernel
        .register(MockComponent::new("display", &tracker).build())
        .await
        .unwrap();
    kernel.start().await.unwrap();
    let readings = record_messages(kernel.channel(), "sensor.reading");
    let isolated = record_messages(kernel.channel(), topics::BOUNDARY_ISOLATED);

    guarded.emit("sensor.reading", json!({ "c": 21 })).await;
    for _ in 0..6 {
        guarded.report_error(&flapping(), ErrorContext::new(ErrorPhase::Runtime)).await;
    }

    assert!(guarded.is_isolated());
    assert!(sensor.is_hidden());
    assert_eq!(payload_strings(&isolated, "componentId"), vec!["sensor"]);

    // Quarantined output is dropped; neighbours are unaffected
    guarded.emit("sensor.reading", json!({ "c": 99 })).await;
    assert_eq!(readings.lock().unwrap().len(), 1);

    let report = kernel.coordinator().check_health().await;
    let sensor_health = report.get("sensor").unwrap();
    assert!(sensor_health.isolated);
    assert_eq!(sensor_health.health, HealthStatus::Unhealthy);
    assert_eq!(sensor_health.error_count, 6);
    assert_eq!(report.get("display").unwrap().health, HealthStatus::Healthy);

    // Operator releases the component once the bus is fixed
    assert!(kernel.boundary().release("sensor").await);
    guarded.emit("sensor.reading", json!({ "c": 22 })).await;
    assert_eq!(readings.lock().unwrap().len(), 2);
    assert_eq!(kernel.coordinator().check_health().await.get("sensor").unwrap().health, HealthStatus::Healthy);

    kernel.shutdown().await;
}

#[tokio::test]
async fn test_runtime_recovery_through_the_kernel() {
    let kernel = Kernel::default();
    let tracker = CallTracker::new();
    let guarded = kernel
        .register(MockComponent::new("panel", &tracker).with_refresh().build())
        .await
        .unwrap()
        .unwrap();
    kernel.start().await.unwrap();
    let recovered = record_messages(kernel.channel(), topics::BOUNDARY_RECOVERED);

    guarded
        .report_error(&ComponentFailure::render("layout overflow"), ErrorPhase::Runtime.into())
        .await;

    assert_eq!(tracker.ids_for("refresh"), vec!["panel"]);
    assert_eq!(payload_strings(&recovered, "strategy"), vec!["refresh"]);
    let record = kernel.coordinator().get_record("panel").await.unwrap();
    assert_eq!(record.health, HealthStatus::Healthy);
    assert_eq!(record.error_count, 1);

    let stats = kernel.boundary().get_error_statistics();
    assert_eq!(stats.total_errors, 1);
    assert_eq!(stats.recovered, 1);
    kernel.shutdown().await;
}

#[tokio::test]
async fn test_strict_budget_from_config() {
    let config = KernelConfig {
        boundary: BoundaryConfig { max_errors_per_component: 0, ..BoundaryConfig::default() },
        ..KernelConfig::default()
    };
    let kernel = Kernel::from_config(config).unwrap();
    let tracker = CallTracker::new();
    let guarded = kernel
        .register(MockComponent::new("fragile", &tracker).with_reset().build())
        .await
        .unwrap()
        .unwrap();
    kernel.start().await.unwrap();

    guarded
        .report_error(&ComponentFailure::invalid_state("bad"), ErrorPhase::Runtime.into())
        .await;

    // Isolation wins over recovery
    assert!(guarded.is_isolated());
    assert!(tracker.ids_for("reset").is_empty());

    kernel.coordinator().unregister("fragile").await.unwrap();
    assert!(kernel.boundary().get_isolated_components().await.is_empty());
    assert!(!guarded.is_isolated());
}
