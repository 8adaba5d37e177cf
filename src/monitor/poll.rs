//! The poll loop: sample the gauge, publish a status, sleep, repeat.
//!
//! # States
//!
//! ```text
//! Idle ──run()──▶ Polling ──fatal error──▶ Faulted
//!                    │
//!                    └──shutdown / UI gone──▶ Stopped
//! ```
//!
//! # Error Handling
//!
//! - Absent device: publish `NoDevice` every tick; the loop never ends on its own.
//! - Transient hardware error: retry after an exponential backoff. More than
//!   `max_retries` consecutive failures count as fatal.
//! - Anything else: publish `Fault` once (waiting for queue space) and stop polling.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::hardware::line::DigitalLine;
use crate::hardware::worker::DeviceHandle;
use crate::monitor::status::{classify, GaugeStatus, Reading};
use crate::monitor::MonitorEvent;

/// Exponential backoff for transient hardware errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Consecutive failures tolerated
    pub max_retries: u32,
    /// Delay after the first failure
    pub initial: Duration,
    /// Delay ceiling
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (starting at 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial: Duration::from_millis(250),
            max: Duration::from_secs(4),
        }
    }
}

/// Everything the poll loop needs to know about the gauge.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Relay consulted when the output is pegged
    pub relay: DigitalLine,
    /// Analog input of the gauge controller
    pub channel: u8,
    /// Vendor resolution index
    pub resolution_index: u8,
    /// Readings strictly above this are pegged
    pub threshold: f64,
    /// Delay between polls
    pub interval: Duration,
    /// Retry policy for transient errors
    pub backoff: BackoffPolicy,
}

impl PollSettings {
    /// Build settings from a validated configuration.
    pub fn from_config(config: &MonitorConfig) -> MonitorResult<Self> {
        Ok(Self {
            relay: config.relay_line()?,
            channel: config.gauge.analog_channel,
            resolution_index: config.gauge.resolution_index,
            threshold: config.gauge.high_voltage_threshold,
            interval: config.poll_interval(),
            backoff: BackoffPolicy {
                max_retries: config.recovery.max_retries,
                initial: Duration::from_millis(config.recovery.initial_backoff_ms),
                max: Duration::from_millis(config.recovery.max_backoff_ms),
            },
        })
    }
}

/// Poll loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Not started yet
    Idle,
    /// Sampling at the configured cadence
    Polling,
    /// Stopped after a fatal hardware error
    Faulted,
    /// Stopped on request or because the UI went away
    Stopped,
}

/// Background sampler. Construct with [`PollLoop::new`] and drive with [`PollLoop::run`].
pub struct PollLoop {
    device: DeviceHandle,
    settings: PollSettings,
    events: mpsc::Sender<MonitorEvent>,
    shutdown: watch::Receiver<bool>,
    state: PollState,
    failures: u32,
    device_absent: bool,
}

impl PollLoop {
    /// Create an idle poll loop.
    pub fn new(
        device: DeviceHandle,
        settings: PollSettings,
        events: mpsc::Sender<MonitorEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            device,
            settings,
            events,
            shutdown,
            state: PollState::Idle,
            failures: 0,
            device_absent: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> PollState {
        self.state
    }

    fn set_state(&mut self, state: PollState) {
        if self.state != state {
            info!(from = ?self.state, to = ?state, "Poll loop state change");
            self.state = state;
        }
    }

    /// Run until shutdown, UI disconnect or a fatal error; returns the final state.
    pub async fn run(mut self) -> PollState {
        self.set_state(PollState::Polling);

        loop {
            if *self.shutdown.borrow() {
                self.set_state(PollState::Stopped);
                break;
            }

            let delay = match self.sample().await {
                Ok(status) => {
                    if self.failures > 0 {
                        info!(failures = self.failures, "Gauge reads recovered");
                    }
                    self.failures = 0;
                    self.device_absent = false;
                    if !self.publish(status) {
                        self.set_state(PollState::Stopped);
                        break;
                    }
                    self.settings.interval
                }
                Err(err) if err.is_device_absent() => {
                    if !self.device_absent {
                        warn!(error = %err, "Polling without a device");
                        self.device_absent = true;
                    }
                    if !self.publish(GaugeStatus::NoDevice) {
                        self.set_state(PollState::Stopped);
                        break;
                    }
                    self.settings.interval
                }
                Err(err) if err.is_transient() && self.failures < self.settings.backoff.max_retries => {
                    self.failures += 1;
                    let delay = self.settings.backoff.delay(self.failures);
                    warn!(
                        attempt = self.failures,
                        max_retries = self.settings.backoff.max_retries,
                        ?delay,
                        error = %err,
                        "Transient hardware error; retrying"
                    );
                    delay
                }
                Err(err) => {
                    self.fault(&err).await;
                    break;
                }
            };

            let stop = tokio::select! {
                _ = sleep(delay) => false,
                changed = self.shutdown.changed() => changed.is_err() || *self.shutdown.borrow(),
            };
            if stop {
                self.set_state(PollState::Stopped);
                break;
            }
        }

        self.state
    }

    async fn sample(&self) -> MonitorResult<GaugeStatus> {
        let volts = self
            .device
            .read_analog(self.settings.channel, self.settings.resolution_index)
            .await?;
        trace!(volts, "Gauge reading");

        match classify(volts, self.settings.threshold) {
            Reading::Pressure(p) => Ok(GaugeStatus::Pressure(p)),
            Reading::Pegged => {
                let relay_on = self.device.is_on(&self.settings.relay).await?;
                Ok(GaugeStatus::pegged(relay_on))
            }
        }
    }

    /// Returns `false` once the UI side has gone away.
    fn publish(&self, status: GaugeStatus) -> bool {
        match self.events.try_send(MonitorEvent::Status(status)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Event queue full; dropping status");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event receiver closed");
                false
            }
        }
    }

    /// Deliver the terminal fault even when the queue is full; only
    /// shutdown or a closed receiver abandon it.
    async fn fault(&mut self, err: &MonitorError) {
        error!(error = %err, failures = self.failures, "Polling stopped");
        let event = MonitorEvent::Status(GaugeStatus::Fault(err.to_string()));
        tokio::select! {
            sent = self.events.send(event) => {
                if sent.is_err() {
                    debug!("Event receiver closed");
                }
            }
            _ = self.shutdown.changed() => debug!("Shutdown before fault was delivered"),
        }
        self.set_state(PollState::Faulted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_ceiling() {
        let policy = BackoffPolicy {
            max_retries: 10,
            initial: Duration::from_millis(250),
            max: Duration::from_secs(4),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(250));
        assert_eq!(policy.delay(2), Duration::from_millis(500));
        assert_eq!(policy.delay(3), Duration::from_secs(1));
        assert_eq!(policy.delay(5), Duration::from_secs(4));
        assert_eq!(policy.delay(6), Duration::from_secs(4));
        assert_eq!(policy.delay(200), Duration::from_secs(4));
    }

    #[test]
    fn settings_from_default_config() {
        let settings = PollSettings::from_config(&MonitorConfig::default()).unwrap();
        assert_eq!(settings.relay.number(), 0);
        assert_eq!(settings.resolution_index, 8);
        assert_eq!(settings.interval, Duration::from_millis(500));
        assert_eq!(settings.backoff, BackoffPolicy::default());
    }
}
