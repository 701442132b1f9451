//! Hardware collaborator contracts for the acquisition sequence.
//!
//! Every operation here is non-blocking: bus transfers and delays complete
//! later by raising an [`Event`](crate::events::Event) from interrupt context.

use core::time::Duration;

/// One-shot delay whose expiry raises [`Event::TimerCompareMatch`](crate::events::Event::TimerCompareMatch).
pub trait DelayTimer {
    fn arm_delay(&mut self, delay: Duration);
}

/// Interrupt-driven two-wire bus.
pub trait SensorBus {
    /// Starts writing a single command byte; completion raises
    /// [`Event::BusTransferComplete`](crate::events::Event::BusTransferComplete).
    fn start_write(&mut self, address: u8, command: u8);

    /// Starts a two-byte read; completion raises
    /// [`Event::BusTransferComplete`](crate::events::Event::BusTransferComplete).
    fn start_read(&mut self, address: u8);

    /// Masks the bus interrupt source once the transfer has been consumed.
    fn disable_interrupt(&mut self);

    /// Big-endian word captured by the most recent read.
    fn last_read(&self) -> u16;
}

/// Supply state for the power-gated sensor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    Off,
    On,
}

pub trait SensorPower {
    fn set_sensor_power(&mut self, state: PowerState);
}

/// Everything the acquisition sequence touches on the sensor side.
pub trait SensorHardware: DelayTimer + SensorBus + SensorPower {}

impl<T> SensorHardware for T where T: DelayTimer + SensorBus + SensorPower {}

/// Rows of the status display driven by the core.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayRow {
    Connection,
    Temperature,
}

impl DisplayRow {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DisplayRow::Connection => "connection",
            DisplayRow::Temperature => "temperature",
        }
    }
}

/// Visible status surface. An empty `text` clears the row.
pub trait StatusDisplay {
    fn show(&mut self, row: DisplayRow, text: &str);

    fn clear(&mut self, row: DisplayRow) {
        self.show(row, "");
    }
}

/// Display that discards every update.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDisplay;

impl NoopDisplay {
    pub const fn new() -> Self {
        Self
    }
}

impl StatusDisplay for NoopDisplay {
    fn show(&mut self, _: DisplayRow, _: &str) {}
}
