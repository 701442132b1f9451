//! Si7021 transfer function and the Temperature Measurement wire record.
//!
//! The record layout is fixed by the Health Thermometer profile: one flags
//! byte followed by an IEEE-11073 32-bit FLOAT (24-bit signed mantissa,
//! 8-bit signed exponent), little-endian. Readings are always sent as
//! millidegrees Celsius with exponent -3.

use core::fmt;

/// Length of the encoded Temperature Measurement record.
pub const RECORD_LEN: usize = 5;

/// Exponent used for every published reading (millidegrees).
pub const TEMPERATURE_EXPONENT: i8 = -3;

/// Flags byte: Celsius, no timestamp, no temperature type.
pub const FLAGS_CELSIUS: u8 = 0x00;

/// Flags bit selecting Fahrenheit units.
pub const FLAG_FAHRENHEIT: u8 = 0x01;

const MANTISSA_MASK: u32 = 0x00FF_FFFF;
// Mantissas outside this range encode NaN, NRes, +/-INF and a reserved value.
const MANTISSA_MIN: i32 = -8_388_605;
const MANTISSA_MAX: i32 = 8_388_605;

/// Temperature in thousandths of a degree Celsius.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Millicelsius(pub i32);

impl Millicelsius {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Whole degrees, truncated toward zero.
    #[must_use]
    pub const fn whole_degrees(self) -> i32 {
        self.0 / 1_000
    }
}

impl fmt::Display for Millicelsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:03}", magnitude / 1_000, magnitude % 1_000)
    }
}

/// Raw 16-bit temperature code read from the Si7021.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureSample(pub u16);

impl TemperatureSample {
    /// Applies the datasheet transfer function `raw * 175.72 / 65536 - 46.85`.
    ///
    /// Computed in integer millidegrees; the fractional part of the scaled code
    /// is floored, which matches the floating-point result truncated to 1 m°C.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn millicelsius(self) -> Millicelsius {
        // 65535 * 175_720 >> 16 is at most 175_717, well inside i32.
        let scaled = (u64::from(self.0) * 175_720) >> 16;
        Millicelsius(scaled as i32 - 46_850)
    }

    #[must_use]
    pub fn record(self) -> TemperatureRecord {
        TemperatureRecord::from_millicelsius(self.millicelsius())
    }
}

/// Packs a mantissa/exponent pair into an IEEE-11073 32-bit FLOAT.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode_float(mantissa: i32, exponent: i8) -> u32 {
    ((mantissa as u32) & MANTISSA_MASK) | ((exponent as u8 as u32) << 24)
}

/// Splits an IEEE-11073 32-bit FLOAT into its signed mantissa and exponent.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const fn decode_float(raw: u32) -> (i32, i8) {
    let mantissa = ((raw << 8) as i32) >> 8;
    let exponent = (raw >> 24) as u8 as i8;
    (mantissa, exponent)
}

/// Encoded Temperature Measurement characteristic value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureRecord([u8; RECORD_LEN]);

impl TemperatureRecord {
    #[must_use]
    pub fn from_millicelsius(value: Millicelsius) -> Self {
        let float = encode_float(value.0, TEMPERATURE_EXPONENT).to_le_bytes();
        Self([FLAGS_CELSIUS, float[0], float[1], float[2], float[3]])
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; RECORD_LEN] {
        &self.0
    }

    #[must_use]
    pub const fn flags(&self) -> u8 {
        self.0[0]
    }

    #[must_use]
    pub const fn float_bits(&self) -> u32 {
        u32::from_le_bytes([self.0[1], self.0[2], self.0[3], self.0[4]])
    }

    #[must_use]
    pub const fn mantissa(&self) -> i32 {
        decode_float(self.float_bits()).0
    }

    #[must_use]
    pub const fn exponent(&self) -> i8 {
        decode_float(self.float_bits()).1
    }

    /// Parses a received record back into millidegrees Celsius.
    ///
    /// Returns `None` for short payloads, Fahrenheit records, reserved FLOAT
    /// values, and results that do not fit the millidegree range.
    #[must_use]
    pub fn decode(payload: &[u8]) -> Option<Millicelsius> {
        let bytes: [u8; RECORD_LEN] = payload.get(..RECORD_LEN)?.try_into().ok()?;
        let record = Self(bytes);
        if record.flags() & FLAG_FAHRENHEIT != 0 {
            return None;
        }

        let (mantissa, exponent) = decode_float(record.float_bits());
        if !(MANTISSA_MIN..=MANTISSA_MAX).contains(&mantissa) {
            return None;
        }

        let shift = i32::from(exponent) + 3;
        let scale = 10_i32.checked_pow(shift.unsigned_abs())?;
        let milli = if shift >= 0 {
            mantissa.checked_mul(scale)?
        } else {
            mantissa / scale
        };
        Some(Millicelsius(milli))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datasheet_example_converts_to_millidegrees() {
        let sample = TemperatureSample(0x6697);
        let expected = f64::from(26_263_u16) * 175.72 / 65_536.0 - 46.85;

        let value = sample.millicelsius();
        assert_eq!(value, Millicelsius(23_568));
        let error = f64::from(value.0) / 1_000.0 - expected;
        assert!(error > -0.001 && error <= 0.0, "off by {error}");
    }

    #[test]
    fn record_layout_matches_health_thermometer_encoding() {
        let record = TemperatureSample(0x6697).record();
        assert_eq!(record.as_bytes(), &[0x00, 0x10, 0x5C, 0x00, 0xFD]);
        assert_eq!(record.flags(), FLAGS_CELSIUS);
        assert_eq!(record.mantissa(), 23_568);
        assert_eq!(record.exponent(), -3);
    }

    #[test]
    fn negative_temperatures_keep_their_sign() {
        let value = TemperatureSample(0).millicelsius();
        assert_eq!(value, Millicelsius(-46_850));

        let record = TemperatureRecord::from_millicelsius(value);
        assert_eq!(record.mantissa(), -46_850);
        assert_eq!(record.as_bytes()[3], 0xFF);
        assert_eq!(TemperatureRecord::decode(record.as_bytes()), Some(value));
    }

    #[test]
    fn full_scale_code_stays_in_range() {
        assert_eq!(TemperatureSample(u16::MAX).millicelsius(), Millicelsius(128_867));
    }

    #[test]
    fn decode_rescales_other_exponents() {
        let mut payload = [0u8; RECORD_LEN];
        payload[1..].copy_from_slice(&encode_float(2_357, -2).to_le_bytes());
        assert_eq!(TemperatureRecord::decode(&payload), Some(Millicelsius(23_570)));

        payload[1..].copy_from_slice(&encode_float(235_681, -4).to_le_bytes());
        assert_eq!(TemperatureRecord::decode(&payload), Some(Millicelsius(23_568)));
    }

    #[test]
    fn decode_rejects_short_fahrenheit_and_nan_payloads() {
        assert_eq!(TemperatureRecord::decode(&[0x00, 0x10, 0x5C]), None);

        let mut fahrenheit = *TemperatureSample(0x6697).record().as_bytes();
        fahrenheit[0] = FLAG_FAHRENHEIT;
        assert_eq!(TemperatureRecord::decode(&fahrenheit), None);

        let mut nan = [0u8; RECORD_LEN];
        nan[1..].copy_from_slice(&0x007F_FFFF_u32.to_le_bytes());
        assert_eq!(TemperatureRecord::decode(&nan), None);
    }

    #[test]
    fn display_renders_three_decimals() {
        extern crate std;
        use std::string::ToString;

        assert_eq!(Millicelsius(23_568).to_string(), "23.568");
        assert_eq!(Millicelsius(-1_050).to_string(), "-1.050");
        assert_eq!(Millicelsius(7).to_string(), "0.007");
    }
}
