//! Configuration System using Figment
//!
//! Configuration is layered from:
//! 1. Built-in defaults (the values the panel has always used)
//! 2. An optional TOML file (default `config/monitor.toml`)
//! 3. Environment variables prefixed with `ION_GAUGE_`, using `__` between
//!    nested keys, e.g. `ION_GAUGE_GAUGE__RELAY=EIO1`
//!
//! # Example
//! ```no_run
//! use ion_gauge_monitor::config::MonitorConfig;
//!
//! let config = MonitorConfig::load()?;
//! config.validate()?;
//! println!("Relay: {}", config.gauge.relay);
//! # Ok::<(), ion_gauge_monitor::error::MonitorError>(())
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};
use crate::hardware::line::DigitalLine;
use crate::hardware::u6::{
    ConnectOptions, IoConfig, TimerClockConfig, ANALOG_CHANNELS, DIGITAL_LINES,
    MAX_RESOLUTION_INDEX,
};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ION_GAUGE_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Gauge polling and relay settings
    pub gauge: GaugeConfig,
    /// Device backend and one-time setup
    pub device: DeviceConfig,
    /// Retry behaviour for hardware errors
    pub recovery: RecoveryConfig,
    /// Window geometry
    pub window: WindowConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Ion Gauge Monitor".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Gauge polling and relay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    /// Digital line switching gauge power
    pub relay: String,
    /// Analog input wired to the gauge controller output
    pub analog_channel: u8,
    /// Vendor resolution index for analog reads
    pub resolution_index: u8,
    /// Readings strictly above this voltage mean the gauge output is pegged
    pub high_voltage_threshold: f64,
    /// Delay between polls in milliseconds
    pub poll_interval_ms: u64,
    /// Upper bound for a relay toggle in milliseconds
    pub toggle_timeout_ms: u64,
    /// Depth of the worker-to-UI event queue
    pub event_queue_capacity: usize,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            relay: "FIO0".to_string(),
            analog_channel: 0,
            resolution_index: 8,
            high_voltage_threshold: 9.8,
            poll_interval_ms: 500,
            toggle_timeout_ms: 2000,
            event_queue_capacity: 32,
        }
    }
}

/// Which device implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeviceBackend {
    /// In-memory U6 with an ion gauge on the configured channel
    Simulated,
    /// No device; the panel shows "No Device"
    None,
}

/// Device backend and one-time setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device implementation
    pub backend: DeviceBackend,
    /// Number of timers enabled (0-4)
    pub timers_enabled: u8,
    /// Enable counter 1
    pub enable_counter1: bool,
    /// First line used by timers and counters (0-8)
    pub timer_pin_offset: u8,
    /// Timer clock base selector (0-6)
    pub timer_clock_base: u8,
    /// Timer clock divisor
    pub timer_clock_divisor: u8,
    /// Depth of the device command queue
    pub command_queue_capacity: usize,
    /// Gauge controller output of the simulated backend while powered
    pub simulated_gauge_volts: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let io = IoConfig::default();
        let clock = TimerClockConfig::default();
        Self {
            backend: DeviceBackend::None,
            timers_enabled: io.timers_enabled,
            enable_counter1: io.enable_counter1,
            timer_pin_offset: io.pin_offset,
            timer_clock_base: clock.base,
            timer_clock_divisor: clock.divisor,
            command_queue_capacity: 16,
            simulated_gauge_volts: 3.0,
        }
    }
}

impl DeviceConfig {
    /// One-time setup applied when connecting.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            timer_clock: TimerClockConfig {
                base: self.timer_clock_base,
                divisor: self.timer_clock_divisor,
            },
            io: IoConfig {
                timers_enabled: self.timers_enabled,
                enable_counter1: self.enable_counter1,
                pin_offset: self.timer_pin_offset,
            },
        }
    }
}

/// Retry behaviour for hardware errors during polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Consecutive transient failures tolerated before polling stops
    pub max_retries: u32,
    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds
    pub max_backoff_ms: u64,
    /// Time allowed for background tasks to stop on exit, in milliseconds
    pub shutdown_grace_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
            shutdown_grace_ms: 500,
        }
    }
}

/// Window geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Inner width in points
    pub width: f32,
    /// Inner height in points
    pub height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Ion Gauge".to_string(),
            width: 300.0,
            height: 300.0,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the default file and environment variables.
    pub fn load() -> MonitorResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and the environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> MonitorResult<Self> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Parse the configured relay line.
    pub fn relay_line(&self) -> MonitorResult<DigitalLine> {
        Ok(DigitalLine::parse(&self.gauge.relay)?)
    }

    /// Delay between polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.gauge.poll_interval_ms)
    }

    /// Upper bound for a relay toggle.
    pub fn toggle_timeout(&self) -> Duration {
        Duration::from_millis(self.gauge.toggle_timeout_ms)
    }

    /// Validate configuration after loading.
    ///
    /// The relay name is parsed here so that a malformed identifier stops the
    /// program at startup rather than on the first click.
    pub fn validate(&self) -> MonitorResult<()> {
        let invalid = |msg: String| Err(MonitorError::Configuration(msg));

        if !VALID_LOG_LEVELS.contains(&self.application.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LOG_LEVELS.join(", ")
            ));
        }
        if !VALID_LOG_FORMATS.contains(&self.application.log_format.as_str()) {
            return invalid(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                VALID_LOG_FORMATS.join(", ")
            ));
        }

        let relay = self.relay_line()?;
        if relay.number() >= DIGITAL_LINES {
            return invalid(format!(
                "Relay {} is beyond the U6's {} digital lines",
                relay, DIGITAL_LINES
            ));
        }

        let device = &self.device;
        if device.timers_enabled > 4 {
            return invalid(format!(
                "Invalid timers_enabled {}. Must be 0-4",
                device.timers_enabled
            ));
        }
        if device.timer_pin_offset > 8 {
            return invalid(format!(
                "Invalid timer_pin_offset {}. Must be 0-8",
                device.timer_pin_offset
            ));
        }
        if device.timer_clock_base > 6 {
            return invalid(format!(
                "Invalid timer_clock_base {}. Must be 0-6",
                device.timer_clock_base
            ));
        }
        let reserved = device.connect_options().io.reserved_lines();
        if reserved.contains(&relay.number()) {
            return invalid(format!(
                "Relay {} collides with timer/counter lines {}..{}",
                relay, reserved.start, reserved.end
            ));
        }
        if device.command_queue_capacity == 0 {
            return invalid("command_queue_capacity must be at least 1".to_string());
        }
        if !device.simulated_gauge_volts.is_finite() {
            return invalid("simulated_gauge_volts must be finite".to_string());
        }

        let gauge = &self.gauge;
        if gauge.analog_channel >= ANALOG_CHANNELS {
            return invalid(format!(
                "Invalid analog_channel {}. Must be 0-{}",
                gauge.analog_channel,
                ANALOG_CHANNELS - 1
            ));
        }
        if gauge.resolution_index > MAX_RESOLUTION_INDEX {
            return invalid(format!(
                "Invalid resolution_index {}. Must be 0-{}",
                gauge.resolution_index, MAX_RESOLUTION_INDEX
            ));
        }
        if !gauge.high_voltage_threshold.is_finite() {
            return invalid("high_voltage_threshold must be finite".to_string());
        }
        if gauge.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be positive".to_string());
        }
        if gauge.toggle_timeout_ms == 0 {
            return invalid("toggle_timeout_ms must be positive".to_string());
        }
        if gauge.event_queue_capacity == 0 {
            return invalid("event_queue_capacity must be at least 1".to_string());
        }

        let recovery = &self.recovery;
        if recovery.initial_backoff_ms == 0 || recovery.initial_backoff_ms > recovery.max_backoff_ms
        {
            return invalid(format!(
                "Backoff must satisfy 0 < initial_backoff_ms ({}) <= max_backoff_ms ({})",
                recovery.initial_backoff_ms, recovery.max_backoff_ms
            ));
        }

        let window = &self.window;
        if !(window.width > 0.0 && window.height > 0.0) {
            return invalid(format!(
                "Window size {}x{} must be positive",
                window.width, window.height
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gauge.relay, "FIO0");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.gauge.high_voltage_threshold, 9.8);
    }

    #[test]
    fn malformed_relay_is_a_startup_error() {
        let mut config = MonitorConfig::default();
        config.gauge.relay = "FIOx".to_string();
        assert!(matches!(
            config.validate(),
            Err(MonitorError::RelayIdentifier(_))
        ));
    }

    #[test]
    fn relay_on_timer_line_is_rejected() {
        let mut config = MonitorConfig::default();
        config.device.timer_pin_offset = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("collides"), "{}", err);

        // Counter 1 takes the line after the last timer
        let mut config = MonitorConfig::default();
        config.gauge.relay = "FIO2".to_string();
        config.device.enable_counter1 = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn relay_beyond_device_is_rejected() {
        let mut config = MonitorConfig::default();
        config.gauge.relay = "CIO7".to_string();
        assert!(matches!(
            config.validate(),
            Err(MonitorError::Configuration(_))
        ));
    }

    #[test]
    fn invalid_log_level() {
        let mut config = MonitorConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_backoff() {
        let mut config = MonitorConfig::default();
        config.recovery.initial_backoff_ms = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = MonitorConfig::default();
        config.gauge.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn simulator_is_opt_in() {
        assert_eq!(MonitorConfig::default().device.backend, DeviceBackend::None);
        let parsed: MonitorConfig = toml::from_str("[device]\nbackend = \"simulated\"\n").unwrap();
        assert_eq!(parsed.device.backend, DeviceBackend::Simulated);
    }

    #[test]
    fn toml_round_trip_keeps_values() {
        let mut config = MonitorConfig::default();
        config.gauge.relay = "EIO1".to_string();
        config.device.backend = DeviceBackend::Simulated;
        let text = config.to_toml().unwrap();
        let parsed: MonitorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
