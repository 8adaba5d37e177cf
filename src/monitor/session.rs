//! Session lifecycle: worker thread, poll task and the toggle controller.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::hardware::capabilities::GaugeDevice;
use crate::hardware::line::DigitalLine;
use crate::hardware::worker::{DeviceHandle, DeviceWorker};
use crate::monitor::poll::{PollLoop, PollSettings, PollState};
use crate::monitor::MonitorEvent;

/// Issues relay commands on behalf of the window without blocking it.
///
/// Results come back as [`MonitorEvent::Toggled`] or
/// [`MonitorEvent::ToggleFailed`] on the session's event channel, with
/// [`MonitorEvent::RelayState`] for reads outside a toggle.
#[derive(Debug, Clone)]
pub struct GaugeController {
    device: DeviceHandle,
    events: mpsc::Sender<MonitorEvent>,
    relay: DigitalLine,
    toggle_timeout: Duration,
    runtime: Handle,
}

impl GaugeController {
    /// The relay this controller drives.
    pub fn relay(&self) -> &DigitalLine {
        &self.relay
    }

    /// Invert the relay in the background.
    ///
    /// Exactly one `Toggled` or `ToggleFailed` answers each request. After a
    /// failure the real relay state follows as a `RelayState` once the device
    /// can tell; a timed-out toggle reports its outcome when the worker
    /// finally completes it.
    pub fn request_toggle(&self) {
        let this = self.clone();
        self.runtime.spawn(async move {
            let toggle = this.device.toggle(&this.relay);
            tokio::pin!(toggle);

            match timeout(this.toggle_timeout, &mut toggle).await {
                Ok(Ok(on)) => this.send(MonitorEvent::Toggled { on }).await,
                Ok(Err(err)) => {
                    this.toggle_failed(MonitorError::Toggle(err.to_string())).await;
                    this.query_relay().await;
                }
                Err(_) => {
                    this.toggle_failed(MonitorError::ToggleTimeout(this.toggle_timeout))
                        .await;
                    // The worker still runs the command; its answer is the resync
                    match toggle.await {
                        Ok(on) => {
                            info!(relay = %this.relay, on, "Late toggle completed");
                            this.send(MonitorEvent::RelayState { on }).await;
                        }
                        Err(_) => this.query_relay().await,
                    }
                }
            }
        });
    }

    async fn toggle_failed(&self, err: MonitorError) {
        warn!(relay = %self.relay, error = %err, "Relay toggle failed");
        self.send(MonitorEvent::ToggleFailed {
            message: err.to_string(),
        })
        .await;
    }

    /// Query the relay state in the background.
    pub fn refresh_relay_state(&self) {
        let this = self.clone();
        self.runtime.spawn(async move { this.query_relay().await });
    }

    async fn query_relay(&self) {
        match timeout(self.toggle_timeout, self.device.is_on(&self.relay)).await {
            Ok(Ok(on)) => self.send(MonitorEvent::RelayState { on }).await,
            Ok(Err(err)) if err.is_device_absent() => {
                debug!(error = %err, "Relay state unavailable");
            }
            Ok(Err(err)) => warn!(relay = %self.relay, error = %err, "Relay query failed"),
            Err(_) => warn!(relay = %self.relay, "Relay query timed out"),
        }
    }

    async fn send(&self, event: MonitorEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Event receiver closed");
        }
    }
}

/// A running monitor: one device worker and one poll task.
pub struct MonitorSession {
    runtime: Handle,
    worker: DeviceWorker,
    poll_task: JoinHandle<PollState>,
    shutdown_tx: watch::Sender<bool>,
    controller: GaugeController,
    events: Option<mpsc::Receiver<MonitorEvent>>,
    grace: Duration,
}

impl MonitorSession {
    /// Take ownership of `device` and start polling on `runtime`.
    pub fn start(
        config: &MonitorConfig,
        device: Box<dyn GaugeDevice>,
        runtime: Handle,
    ) -> MonitorResult<Self> {
        let settings = PollSettings::from_config(config)?;
        let description = device.describe();
        let (device_handle, worker) =
            DeviceWorker::spawn(device, config.device.command_queue_capacity)?;
        let (events_tx, events_rx) = mpsc::channel(config.gauge.event_queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let controller = GaugeController {
            device: device_handle.clone(),
            events: events_tx.clone(),
            relay: settings.relay.clone(),
            toggle_timeout: config.toggle_timeout(),
            runtime: runtime.clone(),
        };
        controller.refresh_relay_state();

        info!(
            device = %description,
            relay = %settings.relay,
            channel = settings.channel,
            interval = ?settings.interval,
            "Monitor session started"
        );
        let poll_task = runtime.spawn(PollLoop::new(device_handle, settings, events_tx, shutdown_rx).run());

        Ok(Self {
            runtime,
            worker,
            poll_task,
            shutdown_tx,
            controller,
            events: Some(events_rx),
            grace: Duration::from_millis(config.recovery.shutdown_grace_ms),
        })
    }

    /// The event receiver. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<MonitorEvent>> {
        self.events.take()
    }

    /// A controller for relay commands.
    pub fn controller(&self) -> GaugeController {
        self.controller.clone()
    }

    /// Whether the poll task has ended (shutdown or fault).
    pub fn is_polling(&self) -> bool {
        !self.poll_task.is_finished()
    }

    /// Stop polling and release the device.
    ///
    /// Blocks for at most about twice the configured grace period. Must not
    /// be called from inside the runtime. Returns the final poll state, or
    /// `None` if the poll task had to be aborted.
    pub fn shutdown(self) -> Option<PollState> {
        let MonitorSession {
            runtime,
            worker,
            mut poll_task,
            shutdown_tx,
            controller,
            events,
            grace,
        } = self;

        info!("Shutting down monitor session");
        // Receivers may already be gone after a fault
        let _ = shutdown_tx.send(true);

        let final_state = match runtime.block_on(timeout(grace, &mut poll_task)) {
            Ok(Ok(state)) => Some(state),
            Ok(Err(err)) => {
                warn!(error = %err, "Poll task ended abnormally");
                None
            }
            Err(_) => {
                warn!(?grace, "Poll task did not stop in time; aborting");
                poll_task.abort();
                None
            }
        };

        // The worker exits once the last device handle is gone
        drop(controller);
        drop(events);
        if worker.join_timeout(grace) {
            debug!("Device released");
        }
        final_state
    }
}
