mod support;

use bridge_core::config::{
    BUTTON_SERVICE, BUTTON_STATE_CHAR, HEALTH_THERMOMETER_SERVICE, TEMPERATURE_MEASUREMENT_CHAR,
};
use bridge_core::discovery::{
    DiscoveryState, DiscoveryStateMachine, DiscoveryStep, HANDLING_INDICATIONS,
};
use bridge_core::link::{ConnectionContext, LinkEvent, LinkStatus, NotificationMode};

use support::{LinkCall, MockDisplay, MockLink};

const CONNECTION: u8 = 3;
const THERMO_SERVICE: u32 = 0x0001_0010;
const THERMO_CHAR: u16 = 0x0021;
const BUTTON_SERVICE_HANDLE: u32 = 0x0002_0030;
const BUTTON_CHAR: u16 = 0x0041;

struct Rig {
    machine: DiscoveryStateMachine,
    link: MockLink,
    display: MockDisplay,
    context: ConnectionContext,
}

impl Rig {
    fn new() -> Self {
        Self {
            machine: DiscoveryStateMachine::new(),
            link: MockLink::default(),
            display: MockDisplay::default(),
            context: ConnectionContext::new(),
        }
    }

    fn feed(&mut self, event: LinkEvent) -> DiscoveryStep {
        self.machine
            .handle(&event, &mut self.link, &mut self.display, &mut self.context)
    }

    fn open(&mut self) -> DiscoveryStep {
        self.context.connection = Some(CONNECTION);
        self.feed(LinkEvent::ConnectionOpened(CONNECTION))
    }

    fn complete(&mut self) -> DiscoveryStep {
        self.feed(LinkEvent::ProcedureCompleted(Ok(())))
    }

    /// Walks all six procedures, recording handles the way the lifecycle
    /// handler would before each completion.
    fn discover_all(&mut self) {
        self.open();
        self.context.last_service = Some(THERMO_SERVICE);
        self.complete();
        self.context.last_characteristic = Some(THERMO_CHAR);
        self.complete();
        self.complete();
        self.context.last_service = Some(BUTTON_SERVICE_HANDLE);
        self.complete();
        self.context.last_characteristic = Some(BUTTON_CHAR);
        self.complete();
        self.complete();
    }
}

#[test]
fn connection_and_six_completions_reach_step_seven() {
    let mut rig = Rig::new();
    assert_eq!(rig.machine.state().ordinal(), 1);

    rig.discover_all();

    assert_eq!(rig.machine.state(), DiscoveryState::Armed);
    assert_eq!(rig.machine.state().ordinal(), 7);
    assert_eq!(rig.link.calls.len(), 6);
}

#[test]
fn procedures_are_issued_in_order_with_captured_handles() {
    let mut rig = Rig::new();
    rig.discover_all();

    assert_eq!(
        rig.link.calls.as_slice(),
        &[
            LinkCall::DiscoverService {
                connection: CONNECTION,
                uuid: HEALTH_THERMOMETER_SERVICE,
            },
            LinkCall::DiscoverCharacteristic {
                connection: CONNECTION,
                service: THERMO_SERVICE,
                uuid: TEMPERATURE_MEASUREMENT_CHAR,
            },
            LinkCall::SetNotification {
                connection: CONNECTION,
                characteristic: THERMO_CHAR,
                mode: NotificationMode::Indication,
            },
            LinkCall::DiscoverService {
                connection: CONNECTION,
                uuid: BUTTON_SERVICE,
            },
            LinkCall::DiscoverCharacteristic {
                connection: CONNECTION,
                service: BUTTON_SERVICE_HANDLE,
                uuid: BUTTON_STATE_CHAR,
            },
            LinkCall::SetNotification {
                connection: CONNECTION,
                characteristic: BUTTON_CHAR,
                mode: NotificationMode::Indication,
            },
        ]
    );

    assert_eq!(rig.context.thermometer.service, Some(THERMO_SERVICE));
    assert_eq!(rig.context.thermometer.characteristic, Some(THERMO_CHAR));
    assert_eq!(rig.context.button.service, Some(BUTTON_SERVICE_HANDLE));
    assert_eq!(rig.context.button.characteristic, Some(BUTTON_CHAR));
    assert!(rig.context.button.indications_armed);
}

#[test]
fn progress_is_shown_after_thermometer_indications_are_armed() {
    let mut rig = Rig::new();
    rig.open();
    rig.context.last_service = Some(THERMO_SERVICE);
    rig.complete();
    rig.context.last_characteristic = Some(THERMO_CHAR);
    rig.complete();
    assert_eq!(rig.display.connection.as_str(), "");

    rig.complete();
    assert_eq!(rig.machine.state(), DiscoveryState::ButtonService);
    assert_eq!(rig.display.connection.as_str(), HANDLING_INDICATIONS);
}

#[test]
fn disconnect_after_arming_restarts_discovery() {
    let mut rig = Rig::new();
    rig.discover_all();

    assert_eq!(
        rig.feed(LinkEvent::ConnectionClosed),
        DiscoveryStep::Advanced {
            state: DiscoveryState::AwaitingConnection,
            request: None,
        }
    );
    assert_eq!(rig.machine.state().ordinal(), 1);

    rig.context.reset();
    rig.link.calls.clear();
    rig.open();
    assert_eq!(rig.machine.state(), DiscoveryState::ThermometerService);
    assert_eq!(
        rig.link.calls.as_slice(),
        &[LinkCall::DiscoverService {
            connection: CONNECTION,
            uuid: HEALTH_THERMOMETER_SERVICE,
        }]
    );
}

#[test]
fn unrelated_events_leave_the_step_unchanged() {
    let mut rig = Rig::new();
    assert_eq!(rig.complete(), DiscoveryStep::Ignored);
    assert_eq!(rig.feed(LinkEvent::IndicationConfirmed), DiscoveryStep::Ignored);

    rig.open();
    for event in [
        LinkEvent::IndicationConfirmed,
        LinkEvent::IndicationsEnabled(true),
        LinkEvent::ServiceDiscovered(THERMO_SERVICE),
        LinkEvent::CharacteristicDiscovered(THERMO_CHAR),
        LinkEvent::ConnectionOpened(CONNECTION),
    ] {
        assert_eq!(rig.feed(event), DiscoveryStep::Ignored);
        assert_eq!(rig.machine.state(), DiscoveryState::ThermometerService);
    }
    assert_eq!(rig.link.calls.len(), 1);
}

#[test]
fn failed_requests_still_advance() {
    let mut rig = Rig::new();
    rig.link.fail_discovery = true;

    assert_eq!(
        rig.open(),
        DiscoveryStep::Advanced {
            state: DiscoveryState::ThermometerService,
            request: Some(Err(LinkStatus::BUSY)),
        }
    );
    rig.context.last_service = Some(THERMO_SERVICE);
    assert_eq!(
        rig.feed(LinkEvent::ProcedureCompleted(Err(LinkStatus::BUSY))),
        DiscoveryStep::Advanced {
            state: DiscoveryState::ThermometerCharacteristic,
            request: Some(Err(LinkStatus::BUSY)),
        }
    );
}

#[test]
fn missing_handles_skip_the_procedure() {
    let mut rig = Rig::new();
    rig.open();

    // The peer reported no thermometer service.
    assert_eq!(
        rig.complete(),
        DiscoveryStep::Advanced {
            state: DiscoveryState::ThermometerCharacteristic,
            request: Some(Err(LinkStatus::INVALID_HANDLE)),
        }
    );
    assert_eq!(
        rig.complete(),
        DiscoveryStep::Advanced {
            state: DiscoveryState::ThermometerIndications,
            request: Some(Err(LinkStatus::INVALID_HANDLE)),
        }
    );
    assert_eq!(rig.link.calls.len(), 1);
}

#[test]
fn reset_returns_to_step_one_from_any_step() {
    let mut rig = Rig::new();
    rig.open();
    rig.complete();
    assert_eq!(rig.machine.state().ordinal(), 3);

    rig.machine.reset();
    assert_eq!(rig.machine.state(), DiscoveryState::AwaitingConnection);
}
