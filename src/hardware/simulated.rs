//! Simulated U6
//!
//! An in-memory [`U6Driver`] for running the monitor without hardware and for
//! tests. The device state lives behind a shared handle,
//! [`SimulatorControls`], so a test (or the demo binary) can change input
//! voltages and inject faults while the driver itself is owned by the device
//! worker.
//!
//! # Ion Gauge Coupling
//!
//! With [`SimulatedU6::ion_gauge`] one analog channel follows the relay line:
//! while the relay line is an output the channel reads the configured gauge
//! voltage, otherwise the gauge controller output sits on the rail.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{HardwareError, HardwareErrorKind};
use crate::hardware::calibration::{CalibrationInfo, Gain};
use crate::hardware::u6::{
    Direction, IoConfig, TimerClockConfig, U6Driver, ANALOG_CHANNELS, DIGITAL_LINES,
};

/// Voltage an unpowered gauge controller reports.
pub const RAIL_VOLTS: f64 = 10.1;

const LINES: usize = DIGITAL_LINES as usize;
const CHANNELS: usize = ANALOG_CHANNELS as usize;

#[derive(Debug, Clone, Copy)]
struct GaugeCoupling {
    relay_line: u8,
    channel: u8,
    voltage: f64,
}

#[derive(Debug)]
struct SimState {
    calibration: CalibrationInfo,
    directions: [Direction; LINES],
    states: [bool; LINES],
    voltages: [f64; CHANNELS],
    timer_clock: Option<TimerClockConfig>,
    io: Option<IoConfig>,
    gauge: Option<GaugeCoupling>,
    fail_calibration: bool,
    pending_timeouts: u32,
    unplugged: bool,
    operations: u64,
}

impl SimState {
    fn begin(&mut self, op: &str) -> Result<(), HardwareError> {
        self.operations += 1;
        if self.unplugged {
            return Err(HardwareError::disconnected(format!(
                "{}: device not present on USB bus",
                op
            )));
        }
        if self.pending_timeouts > 0 {
            self.pending_timeouts -= 1;
            return Err(HardwareError::timeout(format!("{}: no response", op)));
        }
        Ok(())
    }

    fn check_line(line: u8) -> Result<usize, HardwareError> {
        let index = usize::from(line);
        if index >= LINES {
            return Err(HardwareError::new(
                HardwareErrorKind::Rejected,
                format!("IONumber {} out of range", line),
            ));
        }
        Ok(index)
    }

    fn channel_voltage(&self, channel: usize) -> f64 {
        match self.gauge {
            Some(g) if usize::from(g.channel) == channel => {
                if self.directions[usize::from(g.relay_line)] == Direction::Output {
                    g.voltage
                } else {
                    RAIL_VOLTS
                }
            }
            _ => self.voltages[channel],
        }
    }
}

/// Shared handle to a simulator's state.
#[derive(Debug, Clone)]
pub struct SimulatorControls {
    state: Arc<Mutex<SimState>>,
}

impl SimulatorControls {
    /// Set the voltage on an uncoupled analog channel.
    pub fn set_voltage(&self, channel: u8, volts: f64) {
        if let Some(v) = self.state.lock().voltages.get_mut(usize::from(channel)) {
            *v = volts;
        }
    }

    /// Set the voltage the coupled gauge reports while powered.
    pub fn set_gauge_voltage(&self, volts: f64) {
        if let Some(g) = self.state.lock().gauge.as_mut() {
            g.voltage = volts;
        }
    }

    /// Direction of a line.
    pub fn direction(&self, line: u8) -> Direction {
        self.state
            .lock()
            .directions
            .get(usize::from(line))
            .copied()
            .unwrap_or_default()
    }

    /// Output state of a line.
    pub fn state(&self, line: u8) -> bool {
        self.state
            .lock()
            .states
            .get(usize::from(line))
            .copied()
            .unwrap_or_default()
    }

    /// Force a line's direction, as if another program had changed it.
    pub fn set_direction(&self, line: u8, direction: Direction) {
        if let Some(d) = self.state.lock().directions.get_mut(usize::from(line)) {
            *d = direction;
        }
    }

    /// Timer clock last configured.
    pub fn timer_clock(&self) -> Option<TimerClockConfig> {
        self.state.lock().timer_clock
    }

    /// IO configuration last applied.
    pub fn io_config(&self) -> Option<IoConfig> {
        self.state.lock().io
    }

    /// Make the next calibration read fail.
    pub fn fail_calibration(&self, fail: bool) {
        self.state.lock().fail_calibration = fail;
    }

    /// Make the next `count` operations time out.
    pub fn inject_timeouts(&self, count: u32) {
        self.state.lock().pending_timeouts = count;
    }

    /// Simulate pulling the USB cable.
    pub fn unplug(&self) {
        self.state.lock().unplugged = true;
    }

    /// Number of driver operations issued so far.
    pub fn operations(&self) -> u64 {
        self.state.lock().operations
    }
}

/// In-memory U6.
#[derive(Debug)]
pub struct SimulatedU6 {
    controls: SimulatorControls,
}

impl SimulatedU6 {
    /// Create a simulator with all lines as inputs and all channels at 0 V.
    pub fn new() -> Self {
        let state = SimState {
            calibration: CalibrationInfo::nominal(),
            directions: [Direction::Input; LINES],
            states: [false; LINES],
            voltages: [0.0; CHANNELS],
            timer_clock: None,
            io: None,
            gauge: None,
            fail_calibration: false,
            pending_timeouts: 0,
            unplugged: false,
            operations: 0,
        };
        Self {
            controls: SimulatorControls {
                state: Arc::new(Mutex::new(state)),
            },
        }
    }

    /// Create a simulator with an ion gauge controller on `channel` that is
    /// powered through `relay_line`.
    ///
    /// # Arguments
    /// * `relay_line` - Physical line number of the gauge relay
    /// * `channel` - Analog input wired to the controller output
    /// * `voltage` - Controller output while the gauge is powered
    pub fn ion_gauge(relay_line: u8, channel: u8, voltage: f64) -> Self {
        let sim = Self::new();
        sim.controls.state.lock().gauge = Some(GaugeCoupling {
            relay_line: relay_line.min(DIGITAL_LINES as u8 - 1),
            channel,
            voltage,
        });
        sim
    }

    /// Handle for inspecting and driving the simulator.
    pub fn controls(&self) -> SimulatorControls {
        self.controls.clone()
    }
}

impl Default for SimulatedU6 {
    fn default() -> Self {
        Self::new()
    }
}

impl U6Driver for SimulatedU6 {
    fn read_calibration(&mut self) -> Result<CalibrationInfo, HardwareError> {
        let mut state = self.controls.state.lock();
        state.begin("getCalibrationData")?;
        if state.fail_calibration {
            return Err(HardwareError::new(
                HardwareErrorKind::Calibration,
                "calibration block checksum mismatch",
            ));
        }
        Ok(state.calibration.clone())
    }

    fn config_timer_clock(&mut self, config: TimerClockConfig) -> Result<(), HardwareError> {
        let mut state = self.controls.state.lock();
        state.begin("configTimerClock")?;
        state.timer_clock = Some(config);
        Ok(())
    }

    fn config_io(&mut self, config: IoConfig) -> Result<(), HardwareError> {
        let mut state = self.controls.state.lock();
        state.begin("configIO")?;
        state.io = Some(config);
        Ok(())
    }

    fn bit_dir_write(&mut self, line: u8, direction: Direction) -> Result<(), HardwareError> {
        let mut state = self.controls.state.lock();
        state.begin("BitDirWrite")?;
        let index = SimState::check_line(line)?;
        state.directions[index] = direction;
        Ok(())
    }

    fn bit_state_write(&mut self, line: u8, high: bool) -> Result<(), HardwareError> {
        let mut state = self.controls.state.lock();
        state.begin("BitStateWrite")?;
        let index = SimState::check_line(line)?;
        state.states[index] = high;
        Ok(())
    }

    fn bit_dir_read(&mut self, line: u8) -> Result<Direction, HardwareError> {
        let mut state = self.controls.state.lock();
        state.begin("BitDirRead")?;
        let index = SimState::check_line(line)?;
        Ok(state.directions[index])
    }

    fn ain24(
        &mut self,
        channel: u8,
        _resolution_index: u8,
        gain: Gain,
    ) -> Result<u32, HardwareError> {
        let mut state = self.controls.state.lock();
        state.begin("AIN24")?;
        let index = usize::from(channel);
        if index >= CHANNELS {
            return Err(HardwareError::new(
                HardwareErrorKind::Rejected,
                format!("PositiveChannel {} out of range", channel),
            ));
        }
        let volts = state.channel_voltage(index);
        Ok(state.calibration.for_gain(gain).to_raw(volts))
    }
}
