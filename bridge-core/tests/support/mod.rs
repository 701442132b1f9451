#![allow(dead_code)]

use core::time::Duration;

use bridge_core::link::{
    AttributeHandle, ConnectionHandle, GattClient, GattServer, LinkResult, LinkStatus,
    NotificationMode, ServiceHandle, Uuid,
};
use bridge_core::peripherals::{
    DelayTimer, DisplayRow, PowerState, SensorBus, SensorPower, StatusDisplay,
};
use heapless::{String, Vec};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HwCall {
    Power(PowerState),
    ArmDelay(Duration),
    Write { address: u8, command: u8 },
    Read { address: u8 },
    DisableInterrupt,
}

#[derive(Default)]
pub struct MockHardware {
    pub calls: Vec<HwCall, 64>,
    pub raw: u16,
}

impl MockHardware {
    pub fn with_raw(raw: u16) -> Self {
        Self {
            raw,
            ..Self::default()
        }
    }

    pub fn count(&self, predicate: impl Fn(&HwCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    fn push(&mut self, call: HwCall) {
        self.calls.push(call).expect("hardware call log full");
    }
}

impl DelayTimer for MockHardware {
    fn arm_delay(&mut self, delay: Duration) {
        self.push(HwCall::ArmDelay(delay));
    }
}

impl SensorBus for MockHardware {
    fn start_write(&mut self, address: u8, command: u8) {
        self.push(HwCall::Write { address, command });
    }

    fn start_read(&mut self, address: u8) {
        self.push(HwCall::Read { address });
    }

    fn disable_interrupt(&mut self) {
        self.push(HwCall::DisableInterrupt);
    }

    fn last_read(&self) -> u16 {
        self.raw
    }
}

impl SensorPower for MockHardware {
    fn set_sensor_power(&mut self, state: PowerState) {
        self.push(HwCall::Power(state));
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkCall {
    WriteAttribute {
        handle: AttributeHandle,
        value: Vec<u8, 5>,
    },
    Indicate {
        connection: ConnectionHandle,
        handle: AttributeHandle,
        value: Vec<u8, 5>,
    },
    DiscoverService {
        connection: ConnectionHandle,
        uuid: Uuid,
    },
    DiscoverCharacteristic {
        connection: ConnectionHandle,
        service: ServiceHandle,
        uuid: Uuid,
    },
    SetNotification {
        connection: ConnectionHandle,
        characteristic: AttributeHandle,
        mode: NotificationMode,
    },
}

#[derive(Default)]
pub struct MockLink {
    pub calls: Vec<LinkCall, 64>,
    pub fail_writes: bool,
    pub fail_indications: bool,
    /// Number of upcoming indications to refuse before accepting again.
    pub refuse_indications: usize,
    pub fail_discovery: bool,
}

impl MockLink {
    pub fn indications(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, LinkCall::Indicate { .. }))
            .count()
    }

    fn push(&mut self, call: LinkCall) {
        self.calls.push(call).expect("link call log full");
    }

    fn discovery_status(&self) -> LinkResult {
        if self.fail_discovery {
            Err(LinkStatus::BUSY)
        } else {
            Ok(())
        }
    }
}

impl GattServer for MockLink {
    fn write_attribute(&mut self, handle: AttributeHandle, _: u16, value: &[u8]) -> LinkResult {
        self.push(LinkCall::WriteAttribute {
            handle,
            value: Vec::from_slice(value).expect("record fits"),
        });
        if self.fail_writes {
            Err(LinkStatus::INVALID_HANDLE)
        } else {
            Ok(())
        }
    }

    fn send_indication(
        &mut self,
        connection: ConnectionHandle,
        handle: AttributeHandle,
        value: &[u8],
    ) -> LinkResult {
        self.push(LinkCall::Indicate {
            connection,
            handle,
            value: Vec::from_slice(value).expect("record fits"),
        });
        if self.refuse_indications > 0 {
            self.refuse_indications -= 1;
            return Err(LinkStatus::BUSY);
        }
        if self.fail_indications {
            Err(LinkStatus::BUSY)
        } else {
            Ok(())
        }
    }
}

impl GattClient for MockLink {
    fn discover_primary_service(&mut self, connection: ConnectionHandle, uuid: &Uuid) -> LinkResult {
        self.push(LinkCall::DiscoverService {
            connection,
            uuid: *uuid,
        });
        self.discovery_status()
    }

    fn discover_characteristic(
        &mut self,
        connection: ConnectionHandle,
        service: ServiceHandle,
        uuid: &Uuid,
    ) -> LinkResult {
        self.push(LinkCall::DiscoverCharacteristic {
            connection,
            service,
            uuid: *uuid,
        });
        self.discovery_status()
    }

    fn set_characteristic_notification(
        &mut self,
        connection: ConnectionHandle,
        characteristic: AttributeHandle,
        mode: NotificationMode,
    ) -> LinkResult {
        self.push(LinkCall::SetNotification {
            connection,
            characteristic,
            mode,
        });
        self.discovery_status()
    }
}

#[derive(Default)]
pub struct MockDisplay {
    pub connection: String<32>,
    pub temperature: String<32>,
    pub updates: usize,
}

impl StatusDisplay for MockDisplay {
    fn show(&mut self, row: DisplayRow, text: &str) {
        let target = match row {
            DisplayRow::Connection => &mut self.connection,
            DisplayRow::Temperature => &mut self.temperature,
        };
        target.clear();
        target.push_str(text).expect("row text fits");
        self.updates += 1;
    }
}
