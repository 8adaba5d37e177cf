//! Placeholder for a device that could not be opened.

use crate::error::{MonitorError, MonitorResult};
use crate::hardware::capabilities::{AnalogInput, GaugeDevice, RelayControl};
use crate::hardware::line::DigitalLine;

/// A device that is not there. Every operation fails with
/// [`MonitorError::DeviceAbsent`] carrying the original reason.
#[derive(Debug, Clone)]
pub struct AbsentDevice {
    reason: String,
}

impl AbsentDevice {
    /// Create a placeholder remembering why no device is available.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Why no device is available.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn absent<T>(&self) -> MonitorResult<T> {
        Err(MonitorError::DeviceAbsent(self.reason.clone()))
    }
}

impl RelayControl for AbsentDevice {
    fn turn_on(&mut self, _line: &DigitalLine) -> MonitorResult<()> {
        self.absent()
    }

    fn turn_off(&mut self, _line: &DigitalLine) -> MonitorResult<()> {
        self.absent()
    }

    fn is_on(&mut self, _line: &DigitalLine) -> MonitorResult<bool> {
        self.absent()
    }
}

impl AnalogInput for AbsentDevice {
    fn read_analog(&mut self, _channel: u8, _resolution_index: u8) -> MonitorResult<f64> {
        self.absent()
    }
}

impl GaugeDevice for AbsentDevice {
    fn describe(&self) -> String {
        format!("no device ({})", self.reason)
    }
}
