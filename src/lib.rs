//! # Ion Gauge Monitor
//!
//! Pressure readout and gauge-power relay control for an ion gauge whose
//! controller output is wired to a LabJack U6.
//!
//! ## Crate Structure
//!
//! - **`config`**: `MonitorConfig`, loaded with figment from
//!   `config/monitor.toml` and `ION_GAUGE_*` environment variables.
//! - **`error`**: `MonitorError` and the hardware error taxonomy.
//! - **`hardware`**: digital line names, capability traits, the U6 gauge
//!   adapter, the simulator, and the device worker thread that owns the
//!   device.
//! - **`monitor`**: voltage to status mapping, the poll loop and the session
//!   tying them to the window.
//! - **`gui`**: the eframe window.
//! - **`logging`**: tracing subscriber setup.

pub mod config;
pub mod error;
pub mod gui;
pub mod hardware;
pub mod logging;
pub mod monitor;

pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
