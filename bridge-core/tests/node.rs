mod support;

use bridge_core::acquisition::{AcquisitionState, AcquisitionStep, Delivery};
use bridge_core::config::LOCAL_TEMPERATURE_ATTRIBUTE;
use bridge_core::discovery::DiscoveryState;
use bridge_core::events::{Event, EventAggregator};
use bridge_core::link::LinkEvent;
use bridge_core::node::{Node, NodeRole};
use bridge_core::thermo::{Millicelsius, TemperatureRecord};
use heapless::Vec;

use support::{LinkCall, MockDisplay, MockHardware, MockLink};

type TestNode = Node<MockHardware, MockLink, MockDisplay>;

fn server() -> TestNode {
    let mut node = Node::new(
        NodeRole::Server,
        MockHardware::with_raw(0x6697),
        MockLink::default(),
        MockDisplay::default(),
    );
    node.start();
    node
}

fn client() -> TestNode {
    let mut node = Node::new(
        NodeRole::Client,
        MockHardware::default(),
        MockLink::default(),
        MockDisplay::default(),
    );
    node.start();
    node
}

/// Raises each interrupt in turn and drains the aggregator after every one,
/// the way the firmware loop does after each wake-up.
fn measure(node: &mut TestNode, events: &EventAggregator) {
    for event in [
        Event::TimerUnderflow,
        Event::TimerCompareMatch,
        Event::BusTransferComplete,
        Event::TimerCompareMatch,
        Event::BusTransferComplete,
    ] {
        events.raise(event);
        assert_eq!(node.run_until_idle(events), 1);
    }
}

/// Feeds the measurement events straight to the node, bypassing the aggregator.
fn dispatch_measurement(node: &mut TestNode) -> AcquisitionStep {
    let mut last = AcquisitionStep::Ignored;
    for event in [
        Event::TimerUnderflow,
        Event::TimerCompareMatch,
        Event::BusTransferComplete,
        Event::TimerCompareMatch,
        Event::BusTransferComplete,
    ] {
        last = node.dispatch(event);
    }
    last
}

#[test]
fn server_starts_advertising() {
    let node = server();
    assert_eq!(node.display().connection.as_str(), "Advertising");
    assert_eq!(node.display().temperature.as_str(), "");
}

#[test]
fn aggregator_drives_a_full_measurement() {
    let events = EventAggregator::default();
    let mut node = server();
    node.on_link_event(LinkEvent::ConnectionOpened(1));
    node.on_link_event(LinkEvent::IndicationsEnabled(true));
    assert_eq!(node.display().connection.as_str(), "Connected");

    measure(&mut node, &events);

    assert_eq!(node.acquisition_state(), AcquisitionState::Idle);
    assert_eq!(node.link().indications(), 1);
    assert!(node.context().indication_in_flight);
    assert_eq!(node.display().temperature.as_str(), "Temp=23.568");
    assert_eq!(node.run_until_idle(&events), 0);
}

#[test]
fn coalesced_events_dispatch_by_priority() {
    let events = EventAggregator::default();
    let mut node = server();

    events.raise(Event::BusTransferComplete);
    events.raise(Event::TimerUnderflow);
    events.raise(Event::TimerUnderflow);

    let (first, step) = node.poll(&events).unwrap();
    assert_eq!(first, Event::BusTransferComplete);
    assert_eq!(step, AcquisitionStep::Ignored);

    let (second, step) = node.poll(&events).unwrap();
    assert_eq!(second, Event::TimerUnderflow);
    assert_eq!(
        step,
        AcquisitionStep::Advanced(AcquisitionState::AwaitingPowerOnReset)
    );
    assert!(node.poll(&events).is_none());
}

#[test]
fn confirmation_drains_queued_readings_one_at_a_time() {
    let events = EventAggregator::default();
    let mut node = server();
    node.on_link_event(LinkEvent::ConnectionOpened(1));
    node.on_link_event(LinkEvent::IndicationsEnabled(true));

    measure(&mut node, &events);
    measure(&mut node, &events);
    measure(&mut node, &events);
    assert_eq!(node.link().indications(), 1);
    assert_eq!(node.queue().depth(), 2);

    let step = node.on_link_event(LinkEvent::IndicationConfirmed);
    let drained = step.drained.unwrap();
    assert_eq!(drained.handle, LOCAL_TEMPERATURE_ATTRIBUTE);
    assert_eq!(drained.status, Ok(()));
    assert_eq!(node.queue().depth(), 1);
    assert_eq!(node.link().indications(), 2);
    assert!(node.context().indication_in_flight);

    node.on_link_event(LinkEvent::IndicationConfirmed);
    assert_eq!(node.queue().depth(), 0);
    let step = node.on_link_event(LinkEvent::IndicationConfirmed);
    assert_eq!(step.drained, None);
    assert!(!node.context().indication_in_flight);
    assert_eq!(node.link().indications(), 3);
}

#[test]
fn refused_queued_indication_does_not_strand_the_rest() {
    let events = EventAggregator::default();
    let mut node = server();
    node.on_link_event(LinkEvent::ConnectionOpened(1));
    node.on_link_event(LinkEvent::IndicationsEnabled(true));
    measure(&mut node, &events);
    measure(&mut node, &events);
    measure(&mut node, &events);
    assert_eq!(node.queue().depth(), 2);

    node.link_mut().refuse_indications = 1;
    let step = node.on_link_event(LinkEvent::IndicationConfirmed);
    let drained = step.drained.unwrap();
    assert_eq!(drained.status, Ok(()));
    assert_eq!(drained.discarded, 1);
    assert!(node.queue().is_empty());
    assert!(node.context().indication_in_flight);
    assert_eq!(node.link().indications(), 3);

    node.on_link_event(LinkEvent::IndicationConfirmed);
    let AcquisitionStep::Completed(publication) = dispatch_measurement(&mut node) else {
        panic!("measurement did not complete");
    };
    assert_eq!(publication.delivery, Delivery::Sent(Ok(())));
    assert_eq!(node.link().indications(), 4);
}

#[test]
fn queue_refused_entirely_leaves_link_free_for_new_readings() {
    let events = EventAggregator::default();
    let mut node = server();
    node.on_link_event(LinkEvent::ConnectionOpened(1));
    node.on_link_event(LinkEvent::IndicationsEnabled(true));
    measure(&mut node, &events);
    measure(&mut node, &events);
    measure(&mut node, &events);

    node.link_mut().refuse_indications = 2;
    let drained = node
        .on_link_event(LinkEvent::IndicationConfirmed)
        .drained
        .unwrap();
    assert!(drained.status.is_err());
    assert_eq!(drained.discarded, 2);
    assert!(node.queue().is_empty());
    assert!(!node.context().indication_in_flight);

    for _ in 0..4 {
        measure(&mut node, &events);
    }
    assert!(node.context().indication_in_flight);
    assert_eq!(node.queue().depth(), 3);
    assert_eq!(node.link().indications(), 4);

    node.on_link_event(LinkEvent::IndicationConfirmed);
    assert_eq!(node.queue().depth(), 2);
    assert_eq!(node.link().indications(), 5);
}

#[test]
fn indications_toggled_off_and_on_resume_publishing() {
    let events = EventAggregator::default();
    let mut node = server();
    node.on_link_event(LinkEvent::ConnectionOpened(1));
    node.on_link_event(LinkEvent::IndicationsEnabled(true));
    measure(&mut node, &events);
    measure(&mut node, &events);
    assert_eq!(node.queue().depth(), 1);

    node.on_link_event(LinkEvent::IndicationsEnabled(false));
    assert!(node.queue().is_empty());
    assert!(!node.context().indication_in_flight);
    node.on_link_event(LinkEvent::IndicationsEnabled(true));

    let AcquisitionStep::Completed(publication) = dispatch_measurement(&mut node) else {
        panic!("measurement did not complete");
    };
    assert_eq!(publication.delivery, Delivery::Sent(Ok(())));
    for _ in 0..3 {
        measure(&mut node, &events);
    }
    assert_eq!(node.link().indications(), 2);
    assert_eq!(node.queue().depth(), 3);

    node.on_link_event(LinkEvent::IndicationConfirmed);
    assert_eq!(node.link().indications(), 3);
    assert_eq!(node.queue().depth(), 2);
}

#[test]
fn disconnect_flushes_queue_and_stops_publishing() {
    let events = EventAggregator::default();
    let mut node = server();
    node.on_link_event(LinkEvent::ConnectionOpened(1));
    node.on_link_event(LinkEvent::IndicationsEnabled(true));
    measure(&mut node, &events);
    measure(&mut node, &events);
    assert_eq!(node.queue().depth(), 1);

    node.on_link_event(LinkEvent::ConnectionClosed);
    assert!(node.queue().is_empty());
    assert!(!node.context().is_open());
    assert!(!node.context().indication_in_flight);
    assert_eq!(node.display().connection.as_str(), "Advertising");
    assert_eq!(node.display().temperature.as_str(), "");

    let AcquisitionStep::Completed(publication) = dispatch_measurement(&mut node) else {
        panic!("measurement did not complete");
    };
    assert_eq!(publication.delivery, Delivery::Suppressed);
    assert_eq!(node.link().indications(), 1);
}

#[test]
fn disabling_indications_suppresses_publish() {
    let events = EventAggregator::default();
    let mut node = server();
    node.on_link_event(LinkEvent::ConnectionOpened(1));
    node.on_link_event(LinkEvent::IndicationsEnabled(true));
    node.on_link_event(LinkEvent::IndicationsEnabled(false));

    measure(&mut node, &events);
    assert_eq!(node.link().indications(), 0);
    assert!(node.queue().is_empty());
}

#[test]
fn client_ignores_sensor_events() {
    let events = EventAggregator::default();
    let mut node = client();
    assert_eq!(node.display().connection.as_str(), "Discovering");

    events.raise(Event::TimerUnderflow);
    assert_eq!(node.run_until_idle(&events), 1);
    assert_eq!(node.acquisition_state(), AcquisitionState::Idle);
    assert!(node.hardware().calls.is_empty());
}

#[test]
fn client_discovers_and_decodes_remote_indications() {
    let mut node = client();
    node.on_link_event(LinkEvent::ConnectionOpened(4));
    node.on_link_event(LinkEvent::ServiceDiscovered(0x10));
    node.on_link_event(LinkEvent::ProcedureCompleted(Ok(())));
    node.on_link_event(LinkEvent::CharacteristicDiscovered(0x22));
    node.on_link_event(LinkEvent::ProcedureCompleted(Ok(())));
    node.on_link_event(LinkEvent::ProcedureCompleted(Ok(())));
    node.on_link_event(LinkEvent::ServiceDiscovered(0x30));
    node.on_link_event(LinkEvent::ProcedureCompleted(Ok(())));
    node.on_link_event(LinkEvent::CharacteristicDiscovered(0x44));
    node.on_link_event(LinkEvent::ProcedureCompleted(Ok(())));
    assert_eq!(node.discovery_state(), DiscoveryState::Armed);
    assert!(node.link().calls.iter().any(|call| matches!(
        call,
        LinkCall::SetNotification {
            connection: 4,
            characteristic: 0x22,
            ..
        }
    )));

    let record = TemperatureRecord::from_millicelsius(Millicelsius(21_250));
    let step = node.on_link_event(LinkEvent::IndicationReceived {
        characteristic: 0x22,
        payload: Vec::from_slice(record.as_bytes()).unwrap(),
    });
    assert_eq!(step.remote_reading, Some(Millicelsius(21_250)));
    assert_eq!(node.remote_reading(), Some(Millicelsius(21_250)));
    assert_eq!(node.display().temperature.as_str(), "Temp=21.250");

    // Button indications are not temperatures.
    let step = node.on_link_event(LinkEvent::IndicationReceived {
        characteristic: 0x44,
        payload: Vec::from_slice(&[1]).unwrap(),
    });
    assert_eq!(step.remote_reading, None);
}

#[test]
fn client_restarts_discovery_when_link_drops_mid_sequence() {
    let mut node = client();
    node.on_link_event(LinkEvent::ConnectionOpened(4));
    node.on_link_event(LinkEvent::ProcedureCompleted(Ok(())));
    assert_eq!(node.discovery_state(), DiscoveryState::ThermometerCharacteristic);

    node.on_link_event(LinkEvent::ConnectionClosed);
    assert_eq!(node.discovery_state(), DiscoveryState::AwaitingConnection);
    assert_eq!(node.display().connection.as_str(), "Discovering");

    node.on_link_event(LinkEvent::ConnectionOpened(5));
    assert_eq!(node.discovery_state(), DiscoveryState::ThermometerService);
}
