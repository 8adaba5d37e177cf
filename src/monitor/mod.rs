//! Gauge monitoring: status mapping, the poll loop and the session wiring
//! them to the device worker and the window.

pub mod poll;
pub mod session;
pub mod status;

pub use poll::{BackoffPolicy, PollLoop, PollSettings, PollState};
pub use session::{GaugeController, MonitorSession};
pub use status::GaugeStatus;

/// Messages from the background side to the window.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// New status from the poll loop
    Status(GaugeStatus),
    /// Relay state read from the device outside a toggle: the startup
    /// query, a resync, or a toggle that finished after its caller gave up
    RelayState {
        /// Whether the relay is energized
        on: bool,
    },
    /// Answer to the toggle in flight
    Toggled {
        /// Relay state after the toggle
        on: bool,
    },
    /// A toggle did not complete
    ToggleFailed {
        /// Operator-facing reason
        message: String,
    },
}
