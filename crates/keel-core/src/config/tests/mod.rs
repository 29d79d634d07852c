use std::io::Write;
use std::path::Path;

use tempfile::Builder;

use crate::config::{ConfigError, ConfigFormat, KernelConfig, LifecycleConfig};
use crate::kernel::constants;

#[test]
fn test_defaults() {
    let config = KernelConfig::default();
    assert_eq!(config.channel.history_capacity, constants::DEFAULT_HISTORY_CAPACITY);
    assert!(config.channel.emit_listener_errors);
    assert_eq!(config.channel.default_listener_timeout(), None);
    assert_eq!(config.lifecycle.health_check_interval_ms, 30_000);
    assert!(!config.lifecycle.emit_empty_health_reports);
    assert_eq!(config.boundary.max_errors_per_component, 10);
    assert_eq!(config.boundary.max_errors_per_window, 5);
    assert_eq!(config.boundary.error_window_ms, 60_000);
    assert!(config.boundary.auto_recover);
    assert_eq!(config.boundary.strategy_priorities.reinitialize, 30);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let text = r#"{ "boundary": { "max_errors_per_window": 2 }, "channel": { "default_listener_timeout_ms": 1500 } }"#;
    let config = KernelConfig::parse(text, ConfigFormat::Json).unwrap();

    assert_eq!(config.boundary.max_errors_per_window, 2);
    assert_eq!(config.boundary.max_errors_per_component, 10);
    assert_eq!(config.channel.default_listener_timeout_ms, Some(1500));
    assert_eq!(config.lifecycle, LifecycleConfig::default());
}

#[test]
fn test_empty_document_is_default() {
    assert_eq!(KernelConfig::parse("{}", ConfigFormat::Json).unwrap(), KernelConfig::default());
}

#[test]
fn test_malformed_json() {
    let err = KernelConfig::parse("{ nope", ConfigFormat::Json).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { format: "json", .. }));
}

#[test]
fn test_parse_validates() {
    let err = KernelConfig::parse(r#"{ "lifecycle": { "health_check_interval_ms": 0 } }"#, ConfigFormat::Json)
        .unwrap_err();
    match err {
        ConfigError::InvalidValue { key, .. } => assert_eq!(key, "lifecycle.health_check_interval_ms"),
        other => panic!("Expected invalid value, got {:?}", other),
    }
}

#[test]
fn test_zero_listener_timeout_is_invalid() {
    let mut config = KernelConfig::default();
    config.channel.default_listener_timeout_ms = Some(0);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { key: "channel.default_listener_timeout_ms", .. })
    ));
}

#[test]
fn test_format_from_path() {
    assert_eq!(ConfigFormat::from_path(Path::new("kernel.JSON")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("kernel.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("kernel")), None);
    assert_eq!(ConfigFormat::Json.extension(), "json");
}

#[cfg(feature = "toml-config")]
#[test]
fn test_parse_toml() {
    let text = r#"
[lifecycle]
health_check_interval_ms = 500

[boundary.strategy_priorities]
refresh = 99
"#;
    let config = KernelConfig::parse(text, ConfigFormat::Toml).unwrap();
    assert_eq!(config.lifecycle.health_check_interval_ms, 500);
    assert_eq!(config.boundary.strategy_priorities.refresh, 99);
    assert_eq!(config.boundary.strategy_priorities.reset_state, 20);
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_parse_yaml() {
    let text = "channel:\n  history_capacity: 0\n  emit_listener_errors: false\n";
    let config = KernelConfig::parse(text, ConfigFormat::Yaml).unwrap();
    assert_eq!(config.channel.history_capacity, 0);
    assert!(!config.channel.emit_listener_errors);
    assert_eq!(ConfigFormat::from_path(Path::new("k.yml")), Some(ConfigFormat::Yaml));
}

#[test]
fn test_load_from_file() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{ "boundary": {{ "auto_recover": false }} }}"#).unwrap();

    let config = KernelConfig::load(file.path()).unwrap();
    assert!(!config.boundary.auto_recover);
}

#[test]
fn test_load_unsupported_extension() {
    let file = Builder::new().suffix(".ini").tempfile().unwrap();
    let err = KernelConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = KernelConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
