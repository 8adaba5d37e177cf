//! Device worker: the single owner of the hardware handle.
//!
//! Every hardware call, from the poll loop or from the operator's toggle
//! button, is sent as a [`DeviceCommand`] over a bounded channel to one
//! dedicated thread. That thread runs the blocking vendor calls one at a time
//! and answers each command through a oneshot reply, so two callers can never
//! interleave transfers on the device.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{MonitorError, MonitorResult};
use crate::hardware::capabilities::GaugeDevice;
use crate::hardware::line::DigitalLine;

/// Default command queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

type Reply<T> = oneshot::Sender<MonitorResult<T>>;

/// A request for the device worker.
#[derive(Debug)]
pub enum DeviceCommand {
    /// Read one analog sample.
    ReadAnalog {
        /// Analog channel
        channel: u8,
        /// Vendor resolution index
        resolution_index: u8,
        /// Reply slot
        reply: Reply<f64>,
    },
    /// Read the relay state.
    IsOn {
        /// Relay line
        line: DigitalLine,
        /// Reply slot
        reply: Reply<bool>,
    },
    /// Energize the relay.
    TurnOn {
        /// Relay line
        line: DigitalLine,
        /// Reply slot
        reply: Reply<()>,
    },
    /// Release the relay.
    TurnOff {
        /// Relay line
        line: DigitalLine,
        /// Reply slot
        reply: Reply<()>,
    },
    /// Read the relay state and invert it; replies with the new state.
    Toggle {
        /// Relay line
        line: DigitalLine,
        /// Reply slot
        reply: Reply<bool>,
    },
}

impl DeviceCommand {
    fn execute(self, device: &mut dyn GaugeDevice) {
        // A dropped reply means the caller gave up (e.g. timed out); nothing to do.
        match self {
            DeviceCommand::ReadAnalog {
                channel,
                resolution_index,
                reply,
            } => {
                let _ = reply.send(device.read_analog(channel, resolution_index));
            }
            DeviceCommand::IsOn { line, reply } => {
                let _ = reply.send(device.is_on(&line));
            }
            DeviceCommand::TurnOn { line, reply } => {
                let _ = reply.send(device.turn_on(&line));
            }
            DeviceCommand::TurnOff { line, reply } => {
                let _ = reply.send(device.turn_off(&line));
            }
            DeviceCommand::Toggle { line, reply } => {
                let result = device.toggle(&line);
                if let Ok(on) = &result {
                    info!(line = %line, on, "Relay toggled");
                }
                let _ = reply.send(result);
            }
        }
    }
}

/// Cloneable async handle to the device worker.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    tx: mpsc::Sender<DeviceCommand>,
}

impl DeviceHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> DeviceCommand) -> MonitorResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| MonitorError::WorkerStopped)?;
        rx.await.map_err(|_| MonitorError::WorkerStopped)?
    }

    /// Read one analog sample in volts.
    pub async fn read_analog(&self, channel: u8, resolution_index: u8) -> MonitorResult<f64> {
        self.request(|reply| DeviceCommand::ReadAnalog {
            channel,
            resolution_index,
            reply,
        })
        .await
    }

    /// Read the relay state.
    pub async fn is_on(&self, line: &DigitalLine) -> MonitorResult<bool> {
        let line = line.clone();
        self.request(|reply| DeviceCommand::IsOn { line, reply }).await
    }

    /// Energize the relay.
    pub async fn turn_on(&self, line: &DigitalLine) -> MonitorResult<()> {
        let line = line.clone();
        self.request(|reply| DeviceCommand::TurnOn { line, reply })
            .await
    }

    /// Release the relay.
    pub async fn turn_off(&self, line: &DigitalLine) -> MonitorResult<()> {
        let line = line.clone();
        self.request(|reply| DeviceCommand::TurnOff { line, reply })
            .await
    }

    /// Invert the relay state; returns the new state.
    pub async fn toggle(&self, line: &DigitalLine) -> MonitorResult<bool> {
        let line = line.clone();
        self.request(|reply| DeviceCommand::Toggle { line, reply })
            .await
    }
}

/// Join handle of the worker thread.
#[derive(Debug)]
pub struct DeviceWorker {
    thread: JoinHandle<()>,
}

impl DeviceWorker {
    /// Move `device` onto a new worker thread.
    ///
    /// The thread exits once every [`DeviceHandle`] has been dropped and the
    /// queue is drained.
    pub fn spawn(
        device: Box<dyn GaugeDevice>,
        capacity: usize,
    ) -> MonitorResult<(DeviceHandle, DeviceWorker)> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let thread = thread::Builder::new()
            .name("device-worker".into())
            .spawn(move || run(device, rx))?;
        Ok((DeviceHandle { tx }, DeviceWorker { thread }))
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait up to `grace` for the worker to exit.
    ///
    /// Returns `false` if the thread is still busy (e.g. stuck in a vendor
    /// call); it is then left detached.
    pub fn join_timeout(self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while !self.thread.is_finished() {
            if Instant::now() >= deadline {
                warn!(?grace, "Device worker did not stop in time; detaching");
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if self.thread.join().is_err() {
            warn!("Device worker panicked");
            return false;
        }
        true
    }
}

fn run(mut device: Box<dyn GaugeDevice>, mut rx: mpsc::Receiver<DeviceCommand>) {
    info!(device = %device.describe(), "Device worker started");
    while let Some(command) = rx.blocking_recv() {
        debug!(?command, "Device command");
        command.execute(device.as_mut());
    }
    info!("Device worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::absent::AbsentDevice;
    use crate::hardware::simulated::SimulatedU6;
    use crate::hardware::u6::{ConnectOptions, LabJackGauge};

    fn simulated() -> (DeviceHandle, DeviceWorker) {
        let gauge = LabJackGauge::connect(SimulatedU6::new(), &ConnectOptions::default()).unwrap();
        DeviceWorker::spawn(Box::new(gauge), 4).unwrap()
    }

    #[tokio::test]
    async fn toggle_round_trip() {
        let (handle, worker) = simulated();
        let line = DigitalLine::parse("FIO0").unwrap();

        assert!(!handle.is_on(&line).await.unwrap());
        assert!(handle.toggle(&line).await.unwrap());
        assert!(handle.is_on(&line).await.unwrap());
        assert!(!handle.toggle(&line).await.unwrap());
        assert!(!handle.is_on(&line).await.unwrap());

        drop(handle);
        assert!(worker.join_timeout(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let (handle, worker) = simulated();
        let line = DigitalLine::parse("FIO0").unwrap();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let handle = handle.clone();
            let line = line.clone();
            tasks.push(tokio::spawn(async move { handle.toggle(&line).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // An even number of toggles leaves the relay released
        assert!(!handle.is_on(&line).await.unwrap());

        drop(handle);
        assert!(worker.join_timeout(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn absent_device_errors_pass_through() {
        let (handle, _worker) = DeviceWorker::spawn(Box::new(AbsentDevice::new("unplugged")), 1).unwrap();
        let err = handle.read_analog(0, 8).await.unwrap_err();
        assert!(err.is_device_absent());
    }

    #[tokio::test]
    async fn stopped_worker_is_reported() {
        let (handle, worker) = simulated();
        let (tx, rx) = mpsc::channel::<DeviceCommand>(1);
        drop(rx);
        let orphan = DeviceHandle { tx };
        assert!(matches!(
            orphan.read_analog(0, 8).await,
            Err(MonitorError::WorkerStopped)
        ));

        drop(handle);
        assert!(worker.join_timeout(Duration::from_secs(1)));
    }
}
