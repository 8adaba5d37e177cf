//! Hardware layer: the LabJack U6 adapter and the worker thread that owns it.
//!
//! - [`line`]: digital line names (`FIO0`, `EIO3`, ...)
//! - [`capabilities`]: `RelayControl` / `AnalogInput` traits
//! - [`u6`]: gauge adapter over the vendor driver boundary
//! - [`simulated`]: in-memory U6 for development and tests
//! - [`absent`]: placeholder when no device could be opened
//! - [`worker`]: single-owner thread serializing all device calls

pub mod absent;
pub mod calibration;
pub mod capabilities;
pub mod line;
pub mod simulated;
pub mod u6;
pub mod worker;

pub use absent::AbsentDevice;
pub use capabilities::{AnalogInput, GaugeDevice, RelayControl};
pub use line::DigitalLine;
pub use simulated::SimulatedU6;
pub use u6::{ConnectOptions, LabJackGauge, U6Driver};
pub use worker::{DeviceHandle, DeviceWorker};

use tracing::{info, warn};

use crate::config::{DeviceBackend, MonitorConfig};

/// Open the configured device.
///
/// Never fails: if the device cannot be opened the monitor runs against an
/// [`AbsentDevice`] and shows "No Device".
pub fn open_device(config: &MonitorConfig) -> Box<dyn GaugeDevice> {
    match config.device.backend {
        DeviceBackend::Simulated => {
            let relay = match config.relay_line() {
                Ok(line) => u8::try_from(line.number()).unwrap_or(u8::MAX),
                Err(err) => {
                    warn!(error = %err, "Relay line unusable; running without a device");
                    return Box::new(AbsentDevice::new(err.to_string()));
                }
            };
            let driver = SimulatedU6::ion_gauge(
                relay,
                config.gauge.analog_channel,
                config.device.simulated_gauge_volts,
            );
            connect_or_absent(driver, &config.device.connect_options())
        }
        DeviceBackend::None => {
            info!("No device backend configured");
            Box::new(AbsentDevice::new("no device backend configured"))
        }
    }
}

/// Connect a gauge over `driver`, falling back to an [`AbsentDevice`].
pub fn connect_or_absent<D: U6Driver + 'static>(
    driver: D,
    options: &ConnectOptions,
) -> Box<dyn GaugeDevice> {
    match LabJackGauge::connect(driver, options) {
        Ok(gauge) => Box::new(gauge),
        Err(err) => {
            warn!(error = %err, "LabJack connection failed; running without a device");
            Box::new(AbsentDevice::new(err.to_string()))
        }
    }
}
