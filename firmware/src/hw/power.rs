//! Sensor supply gate.

use bridge_core::peripherals::{PowerState, SensorPower};
use embassy_stm32::gpio::Output;

/// Load switch feeding the Si7021, enabled while the pin is high.
pub struct GpioSensorPower<'d> {
    enable: Output<'d>,
}

impl<'d> GpioSensorPower<'d> {
    pub fn new(enable: Output<'d>) -> Self {
        Self { enable }
    }
}

impl SensorPower for GpioSensorPower<'_> {
    fn set_sensor_power(&mut self, state: PowerState) {
        match state {
            PowerState::On => self.enable.set_high(),
            PowerState::Off => self.enable.set_low(),
        }
    }
}
