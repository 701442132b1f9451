//! Remote service discovery and indication arming.
//!
//! The client walks a fixed seven-step sequence per connection: thermometer
//! service, thermometer characteristic, arm thermometer indications, button
//! service, button characteristic, arm button indications, then wait for the
//! link to close. Every step issues exactly one GATT procedure and waits for
//! its completion before moving on.
//!
//! A request the link rejects is reported in the returned [`DiscoveryStep`]
//! and the sequence still advances; there is no retry path. Peers that do not
//! expose a service therefore leave later handles unset rather than stalling
//! the sequence.

use core::fmt;

use crate::config::{
    BUTTON_SERVICE, BUTTON_STATE_CHAR, HEALTH_THERMOMETER_SERVICE, TEMPERATURE_MEASUREMENT_CHAR,
};
use crate::link::{
    ConnectionContext, ConnectionHandle, GattClient, LinkEvent, LinkResult, LinkStatus,
    NotificationMode, RemoteService, Uuid,
};
use crate::peripherals::{DisplayRow, StatusDisplay};

/// Text shown once thermometer indications are armed.
pub const HANDLING_INDICATIONS: &str = "Handling Indications";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryState {
    /// Step 1: waiting for a connection.
    #[default]
    AwaitingConnection,
    /// Step 2: thermometer service discovery outstanding.
    ThermometerService,
    /// Step 3: thermometer characteristic discovery outstanding.
    ThermometerCharacteristic,
    /// Step 4: thermometer indication arming outstanding.
    ThermometerIndications,
    /// Step 5: button service discovery outstanding.
    ButtonService,
    /// Step 6: button characteristic discovery outstanding.
    ButtonCharacteristic,
    /// Step 7: fully armed; waiting for the link to close.
    Armed,
}

impl DiscoveryState {
    /// One-based step number.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            DiscoveryState::AwaitingConnection => 1,
            DiscoveryState::ThermometerService => 2,
            DiscoveryState::ThermometerCharacteristic => 3,
            DiscoveryState::ThermometerIndications => 4,
            DiscoveryState::ButtonService => 5,
            DiscoveryState::ButtonCharacteristic => 6,
            DiscoveryState::Armed => 7,
        }
    }

    /// Pure transition table; `None` means the event is ignored.
    #[must_use]
    pub fn on_event(self, event: &LinkEvent) -> Option<(DiscoveryState, DiscoveryAction)> {
        match (self, event) {
            (DiscoveryState::AwaitingConnection, LinkEvent::ConnectionOpened(connection)) => Some((
                DiscoveryState::ThermometerService,
                DiscoveryAction::DiscoverThermometerService(*connection),
            )),
            (DiscoveryState::ThermometerService, LinkEvent::ProcedureCompleted(_)) => Some((
                DiscoveryState::ThermometerCharacteristic,
                DiscoveryAction::DiscoverThermometerCharacteristic,
            )),
            (DiscoveryState::ThermometerCharacteristic, LinkEvent::ProcedureCompleted(_)) => {
                Some((
                    DiscoveryState::ThermometerIndications,
                    DiscoveryAction::ArmThermometer,
                ))
            }
            (DiscoveryState::ThermometerIndications, LinkEvent::ProcedureCompleted(_)) => Some((
                DiscoveryState::ButtonService,
                DiscoveryAction::DiscoverButtonService,
            )),
            (DiscoveryState::ButtonService, LinkEvent::ProcedureCompleted(_)) => Some((
                DiscoveryState::ButtonCharacteristic,
                DiscoveryAction::DiscoverButtonCharacteristic,
            )),
            (DiscoveryState::ButtonCharacteristic, LinkEvent::ProcedureCompleted(_)) => {
                Some((DiscoveryState::Armed, DiscoveryAction::ArmButton))
            }
            (DiscoveryState::Armed, LinkEvent::ConnectionClosed) => {
                Some((DiscoveryState::AwaitingConnection, DiscoveryAction::Restart))
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DiscoveryState::AwaitingConnection => "await-connection",
            DiscoveryState::ThermometerService => "thermo-service",
            DiscoveryState::ThermometerCharacteristic => "thermo-char",
            DiscoveryState::ThermometerIndications => "thermo-arm",
            DiscoveryState::ButtonService => "button-service",
            DiscoveryState::ButtonCharacteristic => "button-char",
            DiscoveryState::Armed => "armed",
        }
    }
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.ordinal(), self.label())
    }
}

/// Procedure requested on entering the next state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryAction {
    DiscoverThermometerService(ConnectionHandle),
    /// Capture service A, discover its characteristic.
    DiscoverThermometerCharacteristic,
    /// Capture characteristic A, arm its indications.
    ArmThermometer,
    /// Report progress, discover service B.
    DiscoverButtonService,
    /// Capture service B, discover its characteristic.
    DiscoverButtonCharacteristic,
    /// Capture characteristic B, arm its indications.
    ArmButton,
    /// Link closed; full rediscovery on the next connection.
    Restart,
}

/// Outcome of feeding one link event to the machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryStep {
    Ignored,
    /// Moved to `state`; `request` is the status of the procedure it issued.
    Advanced {
        state: DiscoveryState,
        request: Option<LinkResult>,
    },
}

#[derive(Debug, Default)]
pub struct DiscoveryStateMachine {
    state: DiscoveryState,
}

impl DiscoveryStateMachine {
    pub const fn new() -> Self {
        Self {
            state: DiscoveryState::AwaitingConnection,
        }
    }

    #[must_use]
    pub const fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Returns to step 1 regardless of the current step.
    pub fn reset(&mut self) {
        self.state = DiscoveryState::AwaitingConnection;
    }

    /// Applies one link event.
    pub fn handle<C, D>(
        &mut self,
        event: &LinkEvent,
        client: &mut C,
        display: &mut D,
        link: &mut ConnectionContext,
    ) -> DiscoveryStep
    where
        C: GattClient,
        D: StatusDisplay,
    {
        let Some((next, action)) = self.state.on_event(event) else {
            return DiscoveryStep::Ignored;
        };
        self.state = next;

        let request = perform(action, client, display, link);
        if let Some(Err(status)) = request {
            bridge_warn!(
                "discovery: request failed entering step {}: {}",
                next.ordinal(),
                status
            );
        }

        DiscoveryStep::Advanced {
            state: next,
            request,
        }
    }
}

fn perform<C, D>(
    action: DiscoveryAction,
    client: &mut C,
    display: &mut D,
    link: &mut ConnectionContext,
) -> Option<LinkResult>
where
    C: GattClient,
    D: StatusDisplay,
{
    match action {
        DiscoveryAction::DiscoverThermometerService(connection) => {
            Some(client.discover_primary_service(connection, &HEALTH_THERMOMETER_SERVICE))
        }
        DiscoveryAction::DiscoverThermometerCharacteristic => {
            link.thermometer.service = link.last_service;
            Some(discover_characteristic(
                client,
                link,
                link.thermometer,
                &TEMPERATURE_MEASUREMENT_CHAR,
            ))
        }
        DiscoveryAction::ArmThermometer => {
            link.thermometer.characteristic = link.last_characteristic;
            Some(arm_indications(client, link, link.thermometer))
        }
        DiscoveryAction::DiscoverButtonService => {
            display.show(DisplayRow::Connection, HANDLING_INDICATIONS);
            Some(match link.connection {
                Some(connection) => client.discover_primary_service(connection, &BUTTON_SERVICE),
                None => Err(LinkStatus::NOT_CONNECTED),
            })
        }
        DiscoveryAction::DiscoverButtonCharacteristic => {
            link.button.service = link.last_service;
            Some(discover_characteristic(client, link, link.button, &BUTTON_STATE_CHAR))
        }
        DiscoveryAction::ArmButton => {
            link.button.characteristic = link.last_characteristic;
            let status = arm_indications(client, link, link.button);
            link.button.indications_armed = true;
            Some(status)
        }
        DiscoveryAction::Restart => None,
    }
}

fn discover_characteristic<C: GattClient>(
    client: &mut C,
    link: &ConnectionContext,
    group: RemoteService,
    uuid: &Uuid,
) -> LinkResult {
    let connection = link.connection.ok_or(LinkStatus::NOT_CONNECTED)?;
    let service = group.service.ok_or(LinkStatus::INVALID_HANDLE)?;
    client.discover_characteristic(connection, service, uuid)
}

fn arm_indications<C: GattClient>(
    client: &mut C,
    link: &ConnectionContext,
    group: RemoteService,
) -> LinkResult {
    let connection = link.connection.ok_or(LinkStatus::NOT_CONNECTED)?;
    let characteristic = group.characteristic.ok_or(LinkStatus::INVALID_HANDLE)?;
    client.set_characteristic_notification(connection, characteristic, NotificationMode::Indication)
}
