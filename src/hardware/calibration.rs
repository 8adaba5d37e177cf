//! U6 analog input calibration.
//!
//! Each U6 ships with calibration constants in flash. For every analog gain
//! there is a positive slope, a negative slope and a center code. Constants are
//! defined on a 16-bit scale; 24-bit readings are scaled down by 256 first.

use crate::error::{HardwareError, HardwareErrorKind};

/// Full-scale code on the 16-bit calibration scale.
const SPAN_16BIT: f64 = 65_535.0;

/// Analog input gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gain {
    /// ±10 V
    #[default]
    X1,
    /// ±1 V
    X10,
    /// ±0.1 V
    X100,
    /// ±0.01 V
    X1000,
}

impl Gain {
    /// Vendor gain index sent with an analog read.
    pub fn index(self) -> u8 {
        match self {
            Gain::X1 => 0,
            Gain::X10 => 1,
            Gain::X100 => 2,
            Gain::X1000 => 3,
        }
    }
}

/// Calibration constants for one gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AinCalibration {
    /// Volts per code above center
    pub positive_slope: f64,
    /// Volts per code below center (stored negative)
    pub negative_slope: f64,
    /// Code that reads as 0 V
    pub center: f64,
}

impl AinCalibration {
    fn validate(&self, gain: Gain) -> Result<(), HardwareError> {
        let bad = |what: &str| {
            Err(HardwareError::new(
                HardwareErrorKind::Calibration,
                format!("gain {:?}: {}", gain, what),
            ))
        };
        if !self.positive_slope.is_finite() || self.positive_slope <= 0.0 {
            return bad("positive slope must be finite and > 0");
        }
        if !self.negative_slope.is_finite() || self.negative_slope >= 0.0 {
            return bad("negative slope must be finite and < 0");
        }
        if !self.center.is_finite() || self.center <= 0.0 || self.center >= SPAN_16BIT {
            return bad("center must lie inside the 16-bit span");
        }
        Ok(())
    }

    /// Convert a raw 24-bit reading to volts.
    pub fn to_volts(&self, raw24: u32) -> f64 {
        let bits = f64::from(raw24) / 256.0;
        if bits < self.center {
            (self.center - bits) * self.negative_slope
        } else {
            (bits - self.center) * self.positive_slope
        }
    }

    /// Inverse of [`to_volts`](Self::to_volts), clamped to the converter range.
    pub fn to_raw(&self, volts: f64) -> u32 {
        let bits = if volts >= 0.0 {
            self.center + volts / self.positive_slope
        } else {
            self.center - volts / self.negative_slope
        };
        let bits = bits.clamp(0.0, SPAN_16BIT);
        (bits * 256.0).round() as u32
    }
}

/// Calibration table read from the device.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationInfo {
    /// Constants indexed by [`Gain::index`]
    pub ain: [AinCalibration; 4],
}

impl CalibrationInfo {
    /// Nominal constants, used until a device has been read.
    pub fn nominal() -> Self {
        let center = 33_523.0;
        let gain = |slope: f64| AinCalibration {
            positive_slope: slope,
            negative_slope: -slope,
            center,
        };
        Self {
            ain: [
                gain(3.158_057_8e-4),
                gain(3.158_057_8e-5),
                gain(3.158_057_8e-6),
                gain(3.158_057_8e-7),
            ],
        }
    }

    /// Check that every gain has usable constants.
    pub fn validate(&self) -> Result<(), HardwareError> {
        for (cal, gain) in self
            .ain
            .iter()
            .zip([Gain::X1, Gain::X10, Gain::X100, Gain::X1000])
        {
            cal.validate(gain)?;
        }
        Ok(())
    }

    /// Constants for a gain.
    pub fn for_gain(&self, gain: Gain) -> &AinCalibration {
        &self.ain[usize::from(gain.index())]
    }
}

impl Default for CalibrationInfo {
    fn default() -> Self {
        Self::nominal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_constants_are_valid() {
        assert!(CalibrationInfo::nominal().validate().is_ok());
    }

    #[test]
    fn center_reads_zero() {
        let cal = CalibrationInfo::nominal();
        let x1 = cal.for_gain(Gain::X1);
        let raw = (x1.center * 256.0) as u32;
        assert!(x1.to_volts(raw).abs() < 1e-9);
    }

    #[test]
    fn raw_conversion_inverts() {
        let cal = CalibrationInfo::nominal();
        let x1 = cal.for_gain(Gain::X1);
        for volts in [-9.5, -1.0, 0.0, 0.25, 3.3, 9.79, 9.85] {
            let back = x1.to_volts(x1.to_raw(volts));
            assert!(
                (back - volts).abs() < 1e-5,
                "{} V came back as {} V",
                volts,
                back
            );
        }
    }

    #[test]
    fn out_of_range_voltage_clamps_to_rail() {
        let cal = CalibrationInfo::nominal();
        let x1 = cal.for_gain(Gain::X1);
        let top = x1.to_volts(x1.to_raw(50.0));
        assert!(top > 10.0 && top < 10.2, "rail was {}", top);
    }

    #[test]
    fn rejects_wrong_slope_sign() {
        let mut cal = CalibrationInfo::nominal();
        cal.ain[2].negative_slope = 3.0e-6;
        let err = cal.validate().unwrap_err();
        assert_eq!(err.kind, HardwareErrorKind::Calibration);
        assert!(err.message.contains("X100"));
    }

    #[test]
    fn rejects_non_finite_center() {
        let mut cal = CalibrationInfo::nominal();
        cal.ain[0].center = f64::NAN;
        assert!(cal.validate().is_err());
    }
}
