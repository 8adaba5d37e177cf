//! Gauge Device Capabilities
//!
//! The monitor only needs two things from a device: switch a relay line and
//! read one analog channel. Each is its own small trait so that the LabJack
//! adapter, the absent-device placeholder and test doubles can all stand in
//! for one another.
//!
//! # Thread Safety
//! - Methods take `&mut self`; a device is owned by exactly one thread (the
//!   device worker) and is never shared.
//! - Implementations must be `Send` so they can be moved onto that thread.

use crate::error::MonitorResult;
use crate::hardware::line::DigitalLine;

/// Capability: Relay switching on a digital line.
///
/// # Contract
/// - `turn_on` energizes the relay; `turn_off` releases it.
/// - `is_on` reports the state read back from the hardware, not a cached value.
/// - Calling `turn_off` on a released relay is a no-op that still succeeds.
pub trait RelayControl: Send {
    /// Energize the relay on `line`.
    fn turn_on(&mut self, line: &DigitalLine) -> MonitorResult<()>;

    /// Release the relay on `line`.
    fn turn_off(&mut self, line: &DigitalLine) -> MonitorResult<()>;

    /// Read back whether the relay on `line` is energized.
    fn is_on(&mut self, line: &DigitalLine) -> MonitorResult<bool>;

    /// Invert the relay state and return the new state.
    fn toggle(&mut self, line: &DigitalLine) -> MonitorResult<bool> {
        if self.is_on(line)? {
            self.turn_off(line)?;
            Ok(false)
        } else {
            self.turn_on(line)?;
            Ok(true)
        }
    }
}

/// Capability: Single-channel analog input.
pub trait AnalogInput: Send {
    /// Read one calibrated sample in volts.
    ///
    /// # Arguments
    /// * `channel` - Analog input channel
    /// * `resolution_index` - Vendor resolution setting (higher is slower and finer)
    fn read_analog(&mut self, channel: u8, resolution_index: u8) -> MonitorResult<f64>;
}

/// Everything the monitor needs from a device.
pub trait GaugeDevice: RelayControl + AnalogInput {
    /// Short description for logs.
    fn describe(&self) -> String;
}
