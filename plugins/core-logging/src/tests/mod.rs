use std::sync::Arc;

use keel_core::{Component, Kernel};

use crate::{init_logging, LogFormat, LoggingComponent, LoggingConfig, LoggingError, LOGGING_COMPONENT_ID};

fn fixed(level: &str) -> LoggingConfig {
    LoggingConfig {
        respect_env: false,
        ..LoggingConfig::default().with_level(level)
    }
}

#[test]
fn test_config_defaults() {
    let config = LoggingConfig::default();
    assert_eq!(config.level, "info");
    assert_eq!(config.format, LogFormat::Compact);
    assert!(config.respect_env);
}

#[test]
fn test_config_from_json() {
    let config: LoggingConfig = serde_json::from_str(r#"{ "level": "keel_core=debug,warn", "format": "json" }"#).unwrap();
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, "keel_core=debug,warn");
    assert!(config.ansi, "Unspecified fields keep their defaults");
}

#[test]
fn test_filter_directives() {
    assert!(fixed("keel_core=trace,info").env_filter().is_ok());
    let err = fixed("keel_core=shouting").env_filter().unwrap_err();
    assert!(matches!(err, LoggingError::InvalidDirective { ref directive, .. } if directive == "keel_core=shouting"));
}

#[test]
fn test_invalid_filter_is_rejected_before_install() {
    assert!(init_logging(&fixed("x=nonsense")).is_err());
}

#[test]
fn test_repeated_initialization_is_a_no_op() {
    let config = fixed("warn").with_format(LogFormat::Json);
    init_logging(&config).unwrap();
    assert!(!init_logging(&config).unwrap());
}

#[tokio::test]
async fn test_component_initializes_through_kernel() {
    let kernel = Kernel::default();
    let logging = Arc::new(LoggingComponent::new(fixed("debug")));
    kernel.register(logging.clone()).await.unwrap();

    assert_eq!(kernel.start().await.unwrap(), vec![LOGGING_COMPONENT_ID]);
    assert!(logging.is_ready());
    assert_eq!(logging.component_type(), "logging");

    kernel.shutdown().await;
    assert!(!logging.is_ready());
}
