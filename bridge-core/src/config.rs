//! Compile-time configuration shared by firmware and host targets.
//!
//! Timing values come from the Si7021 datasheet (power-on reset and 14-bit
//! temperature conversion), identifiers from the Bluetooth SIG assigned
//! numbers plus the custom button service used by the paired client.

use core::time::Duration;

use crate::link::Uuid;

/// 7-bit I²C address of the Si7021 humidity/temperature sensor.
pub const SI7021_ADDRESS: u8 = 0x40;

/// "Measure temperature, no hold master" command byte.
pub const SI7021_CMD_MEASURE_TEMP_NO_HOLD: u8 = 0xF3;

/// Delay between powering the sensor and the first bus transaction.
pub const SI7021_POWER_ON_RESET: Duration = Duration::from_micros(80_000);

/// Worst-case 14-bit temperature conversion time.
pub const SI7021_CONVERSION_TIME: Duration = Duration::from_micros(10_800);

/// Number of indications the outbound queue can hold while one is in flight.
pub const NOTIFICATION_QUEUE_DEPTH: usize = 16;

/// Health Thermometer service (0x1809).
pub const HEALTH_THERMOMETER_SERVICE: Uuid = Uuid::Short(0x1809);

/// Temperature Measurement characteristic (0x2A1C).
pub const TEMPERATURE_MEASUREMENT_CHAR: Uuid = Uuid::Short(0x2A1C);

/// Custom button service `00000001-38c8-433e-87ec-652a2d136289`, little-endian.
pub const BUTTON_SERVICE: Uuid = Uuid::Long([
    0x89, 0x62, 0x13, 0x2d, 0x2a, 0x65, 0xec, 0x87, 0x3e, 0x43, 0xc8, 0x38, 0x01, 0x00, 0x00, 0x00,
]);

/// Custom button characteristic `00000002-38c8-433e-87ec-652a2d136289`, little-endian.
pub const BUTTON_STATE_CHAR: Uuid = Uuid::Long([
    0x89, 0x62, 0x13, 0x2d, 0x2a, 0x65, 0xec, 0x87, 0x3e, 0x43, 0xc8, 0x38, 0x02, 0x00, 0x00, 0x00,
]);

/// Local attribute handle of the temperature measurement value in the GATT database.
pub const LOCAL_TEMPERATURE_ATTRIBUTE: u16 = 0x0012;

/// Maximum number of characters rendered on a single display row.
pub const DISPLAY_ROW_CHARS: usize = 20;
