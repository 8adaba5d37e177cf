//! Custom error types for the application.
//!
//! This module defines the primary error type, `MonitorError`, and the hardware
//! error raised at the vendor boundary. Using the `thiserror` crate, it gives each
//! failure category its own variant so that it can be handled where it naturally
//! belongs:
//!
//! - **Startup**: `Config`, `Configuration` and `RelayIdentifier` abort the program
//!   before any window is shown.
//! - **Device construction**: a failed connect leaves an absent device behind;
//!   every later call on it yields `DeviceAbsent`.
//! - **Steady-state polling**: `Hardware` errors are split into transient ones
//!   (retried with backoff) and fatal ones (polling stops with a persistent fault).
//! - **User action**: `Toggle` and `ToggleTimeout` roll back the relay button.

use std::time::Duration;
use thiserror::Error;

use crate::hardware::line::LineParseError;

/// Convenience alias for results using the application error type.
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

/// Classification of failures reported by the DAQ hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareErrorKind {
    /// The device did not answer in time.
    Timeout,
    /// A packet was garbled or the transfer was interrupted.
    Communication,
    /// The device is gone (unplugged or closed).
    Disconnected,
    /// The device answered with an error code.
    Rejected,
    /// Calibration constants could not be read or are unusable.
    Calibration,
}

impl std::fmt::Display for HardwareErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HardwareErrorKind::Timeout => "timeout",
            HardwareErrorKind::Communication => "communication",
            HardwareErrorKind::Disconnected => "disconnected",
            HardwareErrorKind::Rejected => "rejected",
            HardwareErrorKind::Calibration => "calibration",
        };
        write!(f, "{}", label)
    }
}

/// Error raised by a [`U6Driver`](crate::hardware::u6::U6Driver) implementation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("U6 {kind} error: {message}")]
pub struct HardwareError {
    /// Failure category
    pub kind: HardwareErrorKind,
    /// Human readable detail
    pub message: String,
}

impl HardwareError {
    /// Create a new hardware error.
    pub fn new(kind: HardwareErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(HardwareErrorKind::Timeout, message)
    }

    /// Shorthand for a disconnect error.
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(HardwareErrorKind::Disconnected, message)
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            HardwareErrorKind::Timeout | HardwareErrorKind::Communication
        )
    }
}

/// Primary error type for the monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration sources could not be parsed or merged.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but holds an unusable value.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The relay name does not describe a digital line.
    #[error("Invalid relay identifier: {0}")]
    RelayIdentifier(#[from] LineParseError),

    /// No device handle is available.
    #[error("No device connected: {0}")]
    DeviceAbsent(String),

    /// The hardware reported a failure.
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// The relay could not be switched.
    #[error("Relay toggle failed: {0}")]
    Toggle(String),

    /// The relay did not answer within the toggle timeout.
    #[error("Relay toggle timed out after {0:?}")]
    ToggleTimeout(Duration),

    /// The device worker thread has exited.
    #[error("Device worker stopped")]
    WorkerStopped,

    /// Standard I/O failure (thread spawn, runtime creation).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for MonitorError {
    fn from(err: figment::Error) -> Self {
        MonitorError::Config(Box::new(err))
    }
}

impl MonitorError {
    /// Whether the poll loop should retry after this error.
    pub fn is_transient(&self) -> bool {
        match self {
            MonitorError::Hardware(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Whether this error means there is no device at all.
    pub fn is_device_absent(&self) -> bool {
        matches!(self, MonitorError::DeviceAbsent(_))
    }
}
