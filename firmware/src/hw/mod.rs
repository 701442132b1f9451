//! Board adapters for the sensor collaborators.
//!
//! The acquisition sequence only ever requests work; the timer and bus tasks
//! perform it and raise the completion event. [`SensorRequests`] is the
//! hand-off between the two sides.

#[cfg(target_os = "none")]
pub mod power;

use bridge_core::events::{Event, EventAggregator, WakeSignal};
use bridge_core::peripherals::{DelayTimer, PowerState, SensorBus, SensorPower};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;
use portable_atomic::{AtomicBool, AtomicU16, Ordering};

/// Transfer requested on the sensor bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub enum BusRequest {
    Write { address: u8, command: u8 },
    Read { address: u8 },
}

#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub struct SensorRequests {
    delay: Signal<CriticalSectionRawMutex, Duration>,
    bus: Signal<CriticalSectionRawMutex, BusRequest>,
    bus_interrupt: AtomicBool,
    last_read: AtomicU16,
}

#[cfg_attr(not(target_os = "none"), allow(dead_code))]
impl SensorRequests {
    pub const fn new() -> Self {
        Self {
            delay: Signal::new(),
            bus: Signal::new(),
            bus_interrupt: AtomicBool::new(false),
            last_read: AtomicU16::new(0),
        }
    }

    pub async fn next_delay(&self) -> Duration {
        self.delay.wait().await
    }

    pub async fn next_bus(&self) -> BusRequest {
        self.bus.wait().await
    }

    #[cfg(test)]
    pub fn take_delay(&self) -> Option<Duration> {
        self.delay.try_take()
    }

    #[cfg(test)]
    pub fn take_bus(&self) -> Option<BusRequest> {
        self.bus.try_take()
    }

    /// Compare match fired for the armed delay.
    pub fn complete_delay<W: WakeSignal>(&self, events: &EventAggregator<W>) {
        events.raise(Event::TimerCompareMatch);
    }

    /// Publishes a finished transfer.
    ///
    /// `read` carries the raw code of a successful read. The completion event
    /// is only raised while the bus interrupt is enabled; returns whether it was.
    pub fn complete_bus<W: WakeSignal>(&self, events: &EventAggregator<W>, read: Option<u16>) -> bool {
        if let Some(raw) = read {
            self.last_read.store(raw, Ordering::Release);
        }
        if !self.bus_interrupt.load(Ordering::Acquire) {
            return false;
        }
        events.raise(Event::BusTransferComplete);
        true
    }
}

impl Default for SensorRequests {
    fn default() -> Self {
        Self::new()
    }
}

/// Hardware collaborators handed to the acquisition sequence.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub struct BoardHardware<'a, P> {
    requests: &'a SensorRequests,
    power: P,
}

#[cfg_attr(not(target_os = "none"), allow(dead_code))]
impl<'a, P> BoardHardware<'a, P> {
    pub fn new(requests: &'a SensorRequests, power: P) -> Self {
        Self { requests, power }
    }

    #[cfg(test)]
    pub fn power(&self) -> &P {
        &self.power
    }

    fn start_transfer(&mut self, request: BusRequest) {
        self.requests.bus_interrupt.store(true, Ordering::Release);
        self.requests.bus.signal(request);
    }
}

impl<P> DelayTimer for BoardHardware<'_, P> {
    fn arm_delay(&mut self, delay: core::time::Duration) {
        self.requests.delay.signal(core_duration_to_embassy(delay));
    }
}

impl<P> SensorBus for BoardHardware<'_, P> {
    fn start_write(&mut self, address: u8, command: u8) {
        self.start_transfer(BusRequest::Write { address, command });
    }

    fn start_read(&mut self, address: u8) {
        self.start_transfer(BusRequest::Read { address });
    }

    fn disable_interrupt(&mut self) {
        self.requests.bus_interrupt.store(false, Ordering::Release);
    }

    fn last_read(&self) -> u16 {
        self.requests.last_read.load(Ordering::Acquire)
    }
}

impl<P: SensorPower> SensorPower for BoardHardware<'_, P> {
    fn set_sensor_power(&mut self, state: PowerState) {
        self.power.set_sensor_power(state);
    }
}

#[cfg_attr(not(target_os = "none"), allow(dead_code))]
fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}
