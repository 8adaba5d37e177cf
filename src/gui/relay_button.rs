//! State behind the relay button.
//!
//! The button flips as soon as it is clicked. The answer to that click either
//! confirms it ([`MonitorEvent::Toggled`]) or rolls it back
//! ([`MonitorEvent::ToggleFailed`]). Unsolicited [`MonitorEvent::RelayState`]
//! reads only land while no click is in flight.

use crate::monitor::MonitorEvent;

/// Relay button model, kept free of egui so it can be unit tested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayButton {
    on: bool,
    /// State before the click while a toggle is in flight
    pending: Option<bool>,
    error: Option<String>,
}

impl RelayButton {
    /// A released relay with nothing in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay state as currently displayed.
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Whether a toggle is waiting for its answer.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Last toggle failure, cleared by the next click.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Button caption.
    pub fn label(&self) -> &'static str {
        if self.on {
            "Turn Gauge Off"
        } else {
            "Turn Gauge On"
        }
    }

    /// Record a click. Returns `false` (and changes nothing) while a toggle
    /// is already in flight.
    pub fn begin_toggle(&mut self) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(self.on);
        self.on = !self.on;
        self.error = None;
        true
    }

    /// Fold in an event from the background side.
    pub fn apply(&mut self, event: &MonitorEvent) {
        match event {
            MonitorEvent::Toggled { on } => {
                self.on = *on;
                self.pending = None;
            }
            MonitorEvent::RelayState { on } => {
                if self.pending.is_none() {
                    self.on = *on;
                }
            }
            MonitorEvent::ToggleFailed { message } => {
                if let Some(previous) = self.pending.take() {
                    self.on = previous;
                }
                self.error = Some(message.clone());
            }
            MonitorEvent::Status(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_flips_immediately() {
        let mut button = RelayButton::new();
        assert_eq!(button.label(), "Turn Gauge On");

        assert!(button.begin_toggle());
        assert!(button.is_on());
        assert!(button.is_pending());
        assert_eq!(button.label(), "Turn Gauge Off");

        button.apply(&MonitorEvent::Toggled { on: true });
        assert!(button.is_on());
        assert!(!button.is_pending());
    }

    #[test]
    fn failure_rolls_back() {
        let mut button = RelayButton::new();
        button.begin_toggle();
        button.apply(&MonitorEvent::ToggleFailed {
            message: "Relay toggle timed out after 2s".into(),
        });
        assert!(!button.is_on());
        assert!(!button.is_pending());
        assert_eq!(button.error(), Some("Relay toggle timed out after 2s"));

        // Next click clears the error
        assert!(button.begin_toggle());
        assert_eq!(button.error(), None);
    }

    #[test]
    fn second_click_ignored_while_pending() {
        let mut button = RelayButton::new();
        assert!(button.begin_toggle());
        assert!(!button.begin_toggle());
        assert!(button.is_on());
    }

    #[test]
    fn hardware_state_wins() {
        let mut button = RelayButton::new();
        button.begin_toggle();
        // The relay was already on; our toggle turned it off
        button.apply(&MonitorEvent::Toggled { on: false });
        assert!(!button.is_on());
        assert_eq!(button.label(), "Turn Gauge On");
    }

    #[test]
    fn startup_read_does_not_settle_click() {
        let mut button = RelayButton::new();
        button.begin_toggle();

        // Relay read taken before the click arrives after it
        button.apply(&MonitorEvent::RelayState { on: false });
        assert!(button.is_on());
        assert!(button.is_pending());
        assert!(!button.begin_toggle());

        button.apply(&MonitorEvent::Toggled { on: true });
        assert!(button.is_on());
        assert!(!button.is_pending());
    }

    #[test]
    fn late_read_after_failure_resyncs() {
        let mut button = RelayButton::new();
        button.begin_toggle();
        button.apply(&MonitorEvent::ToggleFailed {
            message: "Relay toggle timed out after 100ms".into(),
        });
        assert!(!button.is_on());

        // The stalled toggle completed after all
        button.apply(&MonitorEvent::RelayState { on: true });
        assert!(button.is_on());
        assert_eq!(button.label(), "Turn Gauge Off");
        assert!(button.error().is_some());
    }
}
