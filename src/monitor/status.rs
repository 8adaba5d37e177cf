//! Gauge status derived from one analog reading.
//!
//! The gauge controller outputs a logarithmic voltage: `P = 10^(V - 10)`.
//! When the controller is unpowered (or faulted) its output sits on the rail,
//! so a reading above the threshold is not a pressure at all.

use std::fmt;

/// Status shown in the window.
#[derive(Debug, Clone, PartialEq)]
pub enum GaugeStatus {
    /// A valid pressure reading
    Pressure(f64),
    /// Output pegged and the relay is released
    GaugeOff,
    /// Output pegged although the relay is energized
    Error,
    /// No device could be opened
    NoDevice,
    /// Polling stopped after a hardware failure
    Fault(String),
}

impl GaugeStatus {
    /// Status for a pegged reading given the relay state.
    pub fn pegged(relay_on: bool) -> Self {
        if relay_on {
            GaugeStatus::Error
        } else {
            GaugeStatus::GaugeOff
        }
    }

    /// Extra detail for the operator, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            GaugeStatus::Fault(message) => Some(message),
            _ => None,
        }
    }

    /// Whether the status indicates something is wrong.
    pub fn is_alarm(&self) -> bool {
        matches!(
            self,
            GaugeStatus::Error | GaugeStatus::NoDevice | GaugeStatus::Fault(_)
        )
    }
}

impl fmt::Display for GaugeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaugeStatus::Pressure(p) => f.write_str(&format_scientific(*p, 2)),
            GaugeStatus::GaugeOff => f.write_str("Gauge Off"),
            GaugeStatus::Error => f.write_str("Error"),
            GaugeStatus::NoDevice => f.write_str("No Device"),
            GaugeStatus::Fault(_) => f.write_str("Hardware Fault"),
        }
    }
}

/// Classification of a raw reading before the relay is consulted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Reading converted to pressure
    Pressure(f64),
    /// Reading above the threshold
    Pegged,
}

/// Convert a gauge controller voltage to pressure.
pub fn voltage_to_pressure(volts: f64) -> f64 {
    10f64.powf(volts - 10.0)
}

/// Classify a reading. Only readings strictly above `threshold` are pegged.
pub fn classify(volts: f64, threshold: f64) -> Reading {
    if volts > threshold {
        Reading::Pegged
    } else {
        Reading::Pressure(voltage_to_pressure(volts))
    }
}

/// Full mapping from a reading and relay state to a status.
pub fn evaluate(volts: f64, threshold: f64, relay_on: bool) -> GaugeStatus {
    match classify(volts, threshold) {
        Reading::Pressure(p) => GaugeStatus::Pressure(p),
        Reading::Pegged => GaugeStatus::pegged(relay_on),
    }
}

/// Format in scientific notation with a signed exponent of at least two
/// digits, e.g. `6.17e-01` or `1.00e+03`.
pub fn format_scientific(value: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        // inf / NaN
        return raw;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return raw;
    };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_shows_pressure() {
        let status = evaluate(9.79, 9.8, true);
        assert_eq!(status.to_string(), "6.17e-01");
    }

    #[test]
    fn threshold_itself_is_not_pegged() {
        assert_eq!(classify(9.8, 9.8), Reading::Pressure(voltage_to_pressure(9.8)));
        assert_eq!(evaluate(9.8, 9.8, true).to_string(), "6.31e-01");
    }

    #[test]
    fn pegged_reading_depends_on_relay() {
        assert_eq!(evaluate(9.85, 9.8, false), GaugeStatus::GaugeOff);
        assert_eq!(evaluate(9.85, 9.8, false).to_string(), "Gauge Off");
        assert_eq!(evaluate(9.85, 9.8, true), GaugeStatus::Error);
        assert_eq!(evaluate(9.85, 9.8, true).to_string(), "Error");
    }

    #[test]
    fn typical_gauge_range() {
        assert_eq!(GaugeStatus::Pressure(voltage_to_pressure(3.0)).to_string(), "1.00e-07");
        assert_eq!(GaugeStatus::Pressure(voltage_to_pressure(0.0)).to_string(), "1.00e-10");
        assert_eq!(GaugeStatus::Pressure(voltage_to_pressure(-1.0)).to_string(), "1.00e-11");
    }

    #[test]
    fn scientific_format_matches_fixed_width_exponent() {
        assert_eq!(format_scientific(1234.5, 2), "1.23e+03");
        assert_eq!(format_scientific(1.0, 2), "1.00e+00");
        assert_eq!(format_scientific(0.0, 2), "0.00e+00");
        assert_eq!(format_scientific(2.5e-123, 1), "2.5e-123");
        // Mantissa rounding carries into the exponent
        assert_eq!(format_scientific(9.999, 2), "1.00e+01");
        assert_eq!(format_scientific(f64::INFINITY, 2), "inf");
    }

    #[test]
    fn alarm_statuses() {
        assert!(GaugeStatus::Error.is_alarm());
        assert!(GaugeStatus::NoDevice.is_alarm());
        assert!(GaugeStatus::Fault("unplugged".into()).is_alarm());
        assert!(!GaugeStatus::GaugeOff.is_alarm());
        assert!(!GaugeStatus::Pressure(1e-7).is_alarm());
        assert_eq!(GaugeStatus::Fault("unplugged".into()).detail(), Some("unplugged"));
    }
}
