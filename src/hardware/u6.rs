//! LabJack U6 adapter.
//!
//! [`U6Driver`] is the boundary to the vendor device: it lists exactly the
//! operations the monitor issues (calibration fetch, timer/IO configuration,
//! bit direction and state writes, bit direction read, analog read).
//! [`LabJackGauge`] holds a driver by composition and turns those primitives
//! into the relay and analog capabilities.
//!
//! # Relay Drive
//!
//! The gauge relay is wired active-low: the line sinks the relay coil current
//! when it is an output driven low, and the relay releases when the line is
//! switched back to an input and floats. The line's *direction* therefore is
//! the relay state, and `is_on` reads the direction back.

use std::ops::Range;

use tracing::{debug, info, instrument};

use crate::error::{HardwareError, MonitorError, MonitorResult};
use crate::hardware::calibration::{CalibrationInfo, Gain};
use crate::hardware::capabilities::{AnalogInput, GaugeDevice, RelayControl};
use crate::hardware::line::DigitalLine;

/// Number of digital lines on a U6 (FIO0-7, EIO0-7, CIO0-3, MIO0-2).
pub const DIGITAL_LINES: u32 = 23;

/// Number of single-ended analog inputs on a U6.
pub const ANALOG_CHANNELS: u8 = 14;

/// Highest resolution index accepted by a U6-Pro.
pub const MAX_RESOLUTION_INDEX: u8 = 12;

/// Direction of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// High impedance input
    #[default]
    Input,
    /// Driven output
    Output,
}

/// Timer clock setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerClockConfig {
    /// Clock base selector (0-6)
    pub base: u8,
    /// Clock divisor
    pub divisor: u8,
}

impl Default for TimerClockConfig {
    fn default() -> Self {
        Self {
            base: 3,
            divisor: 4,
        }
    }
}

/// Timer/counter pin assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoConfig {
    /// Number of timers enabled (0-4)
    pub timers_enabled: u8,
    /// Enable counter 1
    pub enable_counter1: bool,
    /// First FIO line used by timers and counters (0-8)
    pub pin_offset: u8,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            timers_enabled: 1,
            enable_counter1: false,
            pin_offset: 1,
        }
    }
}

impl IoConfig {
    /// Lines taken over by enabled timers and counters.
    ///
    /// Timers are assigned first, then enabled counters, consecutively from
    /// the pin offset.
    pub fn reserved_lines(&self) -> Range<u32> {
        let start = u32::from(self.pin_offset);
        let count = u32::from(self.timers_enabled) + u32::from(self.enable_counter1);
        start..start + count
    }
}

/// One-time setup applied when connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectOptions {
    /// Timer clock setup
    pub timer_clock: TimerClockConfig,
    /// Timer/counter pin assignment
    pub io: IoConfig,
}

/// Vendor boundary: the U6 operations this program uses.
///
/// Implementations block until the device answers.
pub trait U6Driver: Send {
    /// Read the calibration constants stored on the device.
    fn read_calibration(&mut self) -> Result<CalibrationInfo, HardwareError>;

    /// Configure the timer clock.
    fn config_timer_clock(&mut self, config: TimerClockConfig) -> Result<(), HardwareError>;

    /// Configure timers and counters.
    fn config_io(&mut self, config: IoConfig) -> Result<(), HardwareError>;

    /// Set the direction of a digital line.
    fn bit_dir_write(&mut self, line: u8, direction: Direction) -> Result<(), HardwareError>;

    /// Set the output state of a digital line.
    fn bit_state_write(&mut self, line: u8, high: bool) -> Result<(), HardwareError>;

    /// Read the direction of a digital line.
    fn bit_dir_read(&mut self, line: u8) -> Result<Direction, HardwareError>;

    /// Read a raw 24-bit analog sample.
    fn ain24(&mut self, channel: u8, resolution_index: u8, gain: Gain)
        -> Result<u32, HardwareError>;
}

/// Gauge adapter over a U6 driver.
pub struct LabJackGauge<D: U6Driver> {
    driver: D,
    calibration: CalibrationInfo,
    gain: Gain,
}

impl<D: U6Driver> LabJackGauge<D> {
    /// Calibrate and configure the device.
    ///
    /// Setup runs once and is not retried; any failure is returned and the
    /// driver is dropped.
    #[instrument(skip(driver), err)]
    pub fn connect(mut driver: D, options: &ConnectOptions) -> MonitorResult<Self> {
        let calibration = driver.read_calibration()?;
        calibration.validate()?;
        debug!("Calibration constants validated");

        driver.config_timer_clock(options.timer_clock)?;
        driver.config_io(options.io)?;

        info!(
            timers = options.io.timers_enabled,
            counter1 = options.io.enable_counter1,
            pin_offset = options.io.pin_offset,
            "LabJack U6 configured"
        );

        Ok(Self {
            driver,
            calibration,
            gain: Gain::default(),
        })
    }

    /// Calibration in use.
    pub fn calibration(&self) -> &CalibrationInfo {
        &self.calibration
    }

    /// Borrow the driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn line_number(line: &DigitalLine) -> MonitorResult<u8> {
        if line.number() >= DIGITAL_LINES {
            return Err(MonitorError::Configuration(format!(
                "{} is beyond the U6's {} digital lines",
                line, DIGITAL_LINES
            )));
        }
        Ok(line.number() as u8)
    }
}

impl<D: U6Driver> RelayControl for LabJackGauge<D> {
    fn turn_on(&mut self, line: &DigitalLine) -> MonitorResult<()> {
        let number = Self::line_number(line)?;
        self.driver.bit_dir_write(number, Direction::Output)?;
        self.driver.bit_state_write(number, false)?;
        debug!(line = %line, "Relay energized");
        Ok(())
    }

    fn turn_off(&mut self, line: &DigitalLine) -> MonitorResult<()> {
        let number = Self::line_number(line)?;
        self.driver.bit_dir_write(number, Direction::Input)?;
        debug!(line = %line, "Relay released");
        Ok(())
    }

    fn is_on(&mut self, line: &DigitalLine) -> MonitorResult<bool> {
        let number = Self::line_number(line)?;
        Ok(self.driver.bit_dir_read(number)? == Direction::Output)
    }
}

impl<D: U6Driver> AnalogInput for LabJackGauge<D> {
    fn read_analog(&mut self, channel: u8, resolution_index: u8) -> MonitorResult<f64> {
        if channel >= ANALOG_CHANNELS {
            return Err(MonitorError::Configuration(format!(
                "analog channel {} is beyond the U6's {} inputs",
                channel, ANALOG_CHANNELS
            )));
        }
        if resolution_index > MAX_RESOLUTION_INDEX {
            return Err(MonitorError::Configuration(format!(
                "resolution index {} exceeds {}",
                resolution_index, MAX_RESOLUTION_INDEX
            )));
        }
        let raw = self.driver.ain24(channel, resolution_index, self.gain)?;
        Ok(self.calibration.for_gain(self.gain).to_volts(raw))
    }
}

impl<D: U6Driver> GaugeDevice for LabJackGauge<D> {
    fn describe(&self) -> String {
        "LabJack U6".to_string()
    }
}
