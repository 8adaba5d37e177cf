//! Configuration loading from TOML files and `ION_GAUGE_*` environment variables.

use std::io::Write;
use std::time::Duration;

use ion_gauge_monitor::config::{DeviceBackend, MonitorConfig};
use ion_gauge_monitor::MonitorError;
use serial_test::serial;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let config = MonitorConfig::load_from("/nonexistent/monitor.toml").unwrap();
    assert_eq!(config, MonitorConfig::default());
}

#[test]
#[serial]
fn test_partial_file_overrides_defaults() {
    let file = write_config(
        r#"
[gauge]
relay = "EIO3"
poll_interval_ms = 1000

[device]
backend = "simulated"
"#,
    );

    let config = MonitorConfig::load_from(file.path()).unwrap();
    assert_eq!(config.relay_line().unwrap().number(), 11);
    assert_eq!(config.poll_interval(), Duration::from_secs(1));
    assert_eq!(config.device.backend, DeviceBackend::Simulated);
    // Untouched keys keep their defaults
    assert_eq!(config.gauge.high_voltage_threshold, 9.8);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_wrong_type_is_a_config_error() {
    let file = write_config(
        r#"
[gauge]
poll_interval_ms = "fast"
"#,
    );

    assert!(matches!(
        MonitorConfig::load_from(file.path()),
        Err(MonitorError::Config(_))
    ));
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = write_config(
        r#"
[gauge]
relay = "FIO0"
"#,
    );

    std::env::set_var("ION_GAUGE_GAUGE__RELAY", "FIO4");
    std::env::set_var("ION_GAUGE_RECOVERY__MAX_RETRIES", "9");
    let result = MonitorConfig::load_from(file.path());
    std::env::remove_var("ION_GAUGE_GAUGE__RELAY");
    std::env::remove_var("ION_GAUGE_RECOVERY__MAX_RETRIES");

    let config = result.unwrap();
    assert_eq!(config.gauge.relay, "FIO4");
    assert_eq!(config.recovery.max_retries, 9);
}

#[test]
#[serial]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/monitor.toml");
    let config = MonitorConfig::load_from(path).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config, MonitorConfig::default());
}
