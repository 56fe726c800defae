//! Range Converter - raw axis magnitude to pulse width
//!
//! ```text
//! width = (magnitude / (in_max - in_min)) * (out_max - out_min) + out_min
//! ```
//!
//! The formula divides by the full input span but does not subtract `in_min`,
//! so a centred input of 0 lands on `out_min`. With the default constants the
//! effective output runs from about 400 µs to 2100 µs. This does not match the
//! `[out_min, out_max]` range the constant names suggest. The formula is kept
//! as-is and all four constants are configurable so the range can be corrected
//! without touching the arithmetic.

use crate::snapshot::ChannelSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConverterError {
    #[error("input range is empty or inverted: in_min={in_min}, in_max={in_max}")]
    InputRange { in_min: f64, in_max: f64 },

    #[error("output range is inverted: out_min={out_min}, out_max={out_max}")]
    OutputRange { out_min: f64, out_max: f64 },
}

/// Linear mapping constants, loaded from the `[converter]` config table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConverter {
    pub in_min: f64,
    pub in_max: f64,
    pub out_min: f64,
    pub out_max: f64,
}

impl Default for RangeConverter {
    fn default() -> Self {
        Self {
            in_min: -32768.0,
            in_max: 32767.0,
            out_min: 1250.0,
            out_max: 2950.0,
        }
    }
}

impl RangeConverter {
    pub fn new(in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> Self {
        Self {
            in_min,
            in_max,
            out_min,
            out_max,
        }
    }

    /// Rejects constants for which `convert` would not be monotonic.
    pub fn validate(&self) -> Result<(), ConverterError> {
        if !(self.in_max > self.in_min) {
            return Err(ConverterError::InputRange {
                in_min: self.in_min,
                in_max: self.in_max,
            });
        }
        if !(self.out_max >= self.out_min) {
            return Err(ConverterError::OutputRange {
                out_min: self.out_min,
                out_max: self.out_max,
            });
        }
        Ok(())
    }

    /// Pulse width in microseconds for `magnitude`.
    ///
    /// Out-of-range inputs are extrapolated. The result is truncated toward
    /// zero and saturates at the `i32` bounds.
    pub fn convert(&self, magnitude: i32) -> i32 {
        let scaled = (f64::from(magnitude) / (self.in_max - self.in_min))
            * (self.out_max - self.out_min)
            + self.out_min;
        // `as` truncates toward zero and saturates
        scaled as i32
    }

    /// Converts every valid record of `snapshot`; the result stays sorted.
    pub fn convert_snapshot(&self, snapshot: &ChannelSnapshot) -> ChannelSnapshot {
        snapshot.map_magnitudes(|m| self.convert(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ChannelId, ChannelRecord, MAX_CHANNELS};

    #[test]
    fn centre_maps_to_out_min() {
        assert_eq!(RangeConverter::default().convert(0), 1250);
    }

    #[test]
    fn extremes_of_default_range() {
        let converter = RangeConverter::default();
        // 32767 / 65535 * 1700 + 1250 = 2099.98...
        assert_eq!(converter.convert(32767), 2099);
        // -32768 / 65535 * 1700 + 1250 = 400.0...
        assert_eq!(converter.convert(-32768), 400);
    }

    #[test]
    fn inputs_outside_range_are_extrapolated() {
        let converter = RangeConverter::new(0.0, 100.0, 1000.0, 2000.0);
        assert_eq!(converter.convert(200), 3000);
        assert_eq!(converter.convert(-100), 0);
    }

    #[test]
    fn constants_are_independent() {
        let converter = RangeConverter::new(-1000.0, 1000.0, 1500.0, 2500.0);
        assert_eq!(converter.convert(0), 1500);
        assert_eq!(converter.convert(1000), 2000);
    }

    #[test]
    fn validate_rejects_inverted_ranges() {
        assert!(RangeConverter::new(5.0, 5.0, 0.0, 1.0).validate().is_err());
        assert!(RangeConverter::new(0.0, 1.0, 2.0, 1.0).validate().is_err());
        assert!(RangeConverter::new(f64::NAN, 1.0, 0.0, 1.0)
            .validate()
            .is_err());
        assert!(RangeConverter::default().validate().is_ok());
    }

    #[test]
    fn snapshot_conversion_keeps_identity_and_order() {
        let mut raw = [ChannelRecord::INVALID; MAX_CHANNELS];
        raw[0] = ChannelRecord::new(ChannelId::B, -32000);
        raw[1] = ChannelRecord::new(ChannelId::A, 0);
        let snapshot = ChannelSnapshot::from_records(raw).unwrap();

        let converted = RangeConverter::default().convert_snapshot(&snapshot);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted.magnitude_of(ChannelId::A), Some(1250));
        assert_eq!(converted.active()[0].channel, Some(ChannelId::B));
        assert!(converted.upholds_invariants());
    }
}
