//! Host stand-ins for the sensor, radio stack, and display.

use std::time::Duration;

use bridge_core::events::Event;
use bridge_core::link::{
    AttributeHandle, ConnectionHandle, GattClient, GattServer, LinkEvent, LinkResult, LinkStatus,
    NotificationMode, ServiceHandle, Uuid,
};
use bridge_core::peripherals::{
    DelayTimer, DisplayRow, PowerState, SensorBus, SensorPower, StatusDisplay,
};

/// ATT "attribute not found", reported when the remote lacks a service.
pub const ATTRIBUTE_NOT_FOUND: LinkStatus = LinkStatus(0x040A);

/// Raw code returned by the simulated Si7021 until changed (23.568 C).
pub const DEFAULT_RAW_CODE: u16 = 0x6697;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PendingHardware {
    Delay(Duration),
    Write { address: u8, command: u8 },
    Read { address: u8 },
}

impl PendingHardware {
    /// Interrupt raised when the operation finishes.
    pub const fn completion(self) -> Event {
        match self {
            PendingHardware::Delay(_) => Event::TimerCompareMatch,
            PendingHardware::Write { .. } | PendingHardware::Read { .. } => {
                Event::BusTransferComplete
            }
        }
    }
}

pub struct SimHardware {
    raw_code: u16,
    latched: u16,
    power: PowerState,
    pending: Option<PendingHardware>,
    elapsed: Duration,
    power_cycles: usize,
}

impl SimHardware {
    pub fn new() -> Self {
        Self {
            raw_code: DEFAULT_RAW_CODE,
            latched: 0,
            power: PowerState::Off,
            pending: None,
            elapsed: Duration::ZERO,
            power_cycles: 0,
        }
    }

    pub fn set_raw_code(&mut self, raw: u16) {
        self.raw_code = raw;
    }

    pub fn raw_code(&self) -> u16 {
        self.raw_code
    }

    pub fn power(&self) -> PowerState {
        self.power
    }

    pub fn power_cycles(&self) -> usize {
        self.power_cycles
    }

    /// Simulated time spent in timer delays.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn pending(&self) -> Option<PendingHardware> {
        self.pending
    }

    /// Finishes the outstanding operation and returns the interrupt it raises.
    pub fn complete_pending(&mut self) -> Option<(PendingHardware, Event)> {
        let pending = self.pending.take()?;
        match pending {
            PendingHardware::Delay(delay) => self.elapsed += delay,
            PendingHardware::Read { .. } => self.latched = self.raw_code,
            PendingHardware::Write { .. } => {}
        }
        Some((pending, pending.completion()))
    }
}

impl Default for SimHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayTimer for SimHardware {
    fn arm_delay(&mut self, delay: Duration) {
        self.pending = Some(PendingHardware::Delay(delay));
    }
}

impl SensorBus for SimHardware {
    fn start_write(&mut self, address: u8, command: u8) {
        self.pending = Some(PendingHardware::Write { address, command });
    }

    fn start_read(&mut self, address: u8) {
        self.pending = Some(PendingHardware::Read { address });
    }

    fn disable_interrupt(&mut self) {}

    fn last_read(&self) -> u16 {
        self.latched
    }
}

impl SensorPower for SimHardware {
    fn set_sensor_power(&mut self, state: PowerState) {
        if state == PowerState::On && self.power == PowerState::Off {
            self.power_cycles += 1;
        }
        self.power = state;
    }
}

/// Client procedure waiting for the simulated remote to answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Procedure {
    Service(Uuid),
    Characteristic(ServiceHandle, Uuid),
    Arm(AttributeHandle),
}

pub struct SimLink {
    connection: Option<ConnectionHandle>,
    attribute: Vec<u8>,
    indications: Vec<Vec<u8>>,
    pending: Option<Procedure>,
    next_handle: u16,
}

impl SimLink {
    pub fn new() -> Self {
        Self {
            connection: None,
            attribute: Vec::new(),
            indications: Vec::new(),
            pending: None,
            next_handle: 0x0010,
        }
    }

    pub fn set_connection(&mut self, connection: Option<ConnectionHandle>) {
        self.connection = connection;
        if connection.is_none() {
            self.pending = None;
        }
    }

    /// Value last written to the local temperature attribute.
    pub fn attribute(&self) -> &[u8] {
        &self.attribute
    }

    pub fn indications(&self) -> &[Vec<u8>] {
        &self.indications
    }

    pub fn pending(&self) -> Option<Procedure> {
        self.pending
    }

    /// Answers the outstanding client procedure.
    ///
    /// A found service or characteristic is reported before the completion,
    /// the way the radio stack orders them.
    pub fn answer(&mut self, found: bool) -> Option<Vec<LinkEvent>> {
        let procedure = self.pending.take()?;
        if !found {
            return Some(vec![LinkEvent::ProcedureCompleted(Err(ATTRIBUTE_NOT_FOUND))]);
        }

        let handle = self.next_handle;
        self.next_handle += 0x10;
        let mut events = Vec::with_capacity(2);
        match procedure {
            Procedure::Service(_) => events.push(LinkEvent::ServiceDiscovered(u32::from(handle))),
            Procedure::Characteristic(..) => {
                events.push(LinkEvent::CharacteristicDiscovered(handle))
            }
            Procedure::Arm(_) => {}
        }
        events.push(LinkEvent::ProcedureCompleted(Ok(())));
        Some(events)
    }

    fn request(&mut self, connection: ConnectionHandle, procedure: Procedure) -> LinkResult {
        if self.connection != Some(connection) {
            return Err(LinkStatus::NOT_CONNECTED);
        }
        if self.pending.is_some() {
            return Err(LinkStatus::BUSY);
        }
        self.pending = Some(procedure);
        Ok(())
    }
}

impl Default for SimLink {
    fn default() -> Self {
        Self::new()
    }
}

impl GattServer for SimLink {
    fn write_attribute(&mut self, _: AttributeHandle, offset: u16, value: &[u8]) -> LinkResult {
        let offset = usize::from(offset);
        self.attribute.truncate(offset);
        self.attribute.resize(offset, 0);
        self.attribute.extend_from_slice(value);
        Ok(())
    }

    fn send_indication(
        &mut self,
        connection: ConnectionHandle,
        _: AttributeHandle,
        value: &[u8],
    ) -> LinkResult {
        if self.connection != Some(connection) {
            return Err(LinkStatus::NOT_CONNECTED);
        }
        self.indications.push(value.to_vec());
        Ok(())
    }
}

impl GattClient for SimLink {
    fn discover_primary_service(&mut self, connection: ConnectionHandle, uuid: &Uuid) -> LinkResult {
        self.request(connection, Procedure::Service(*uuid))
    }

    fn discover_characteristic(
        &mut self,
        connection: ConnectionHandle,
        service: ServiceHandle,
        uuid: &Uuid,
    ) -> LinkResult {
        self.request(connection, Procedure::Characteristic(service, *uuid))
    }

    fn set_characteristic_notification(
        &mut self,
        connection: ConnectionHandle,
        characteristic: AttributeHandle,
        mode: NotificationMode,
    ) -> LinkResult {
        if mode == NotificationMode::Disabled {
            return Ok(());
        }
        self.request(connection, Procedure::Arm(characteristic))
    }
}

/// Two-row display kept as text.
#[derive(Default)]
pub struct SimDisplay {
    connection: String,
    temperature: String,
}

impl SimDisplay {
    pub fn row(&self, row: DisplayRow) -> &str {
        match row {
            DisplayRow::Connection => &self.connection,
            DisplayRow::Temperature => &self.temperature,
        }
    }
}

impl StatusDisplay for SimDisplay {
    fn show(&mut self, row: DisplayRow, text: &str) {
        let target = match row {
            DisplayRow::Connection => &mut self.connection,
            DisplayRow::Temperature => &mut self.temperature,
        };
        target.clear();
        target.push_str(text);
    }
}
