//! Process-loop dispatcher tying the aggregator, both sequences, and the link together.
//!
//! A [`Node`] owns the collaborators, the [`ConnectionContext`], and the
//! outbound queue. Firmware and the emulator call [`Node::run_until_idle`]
//! after every wake-up and [`Node::on_link_event`] for every signal the radio
//! stack reports; neither call blocks.

use core::fmt::Write as _;

use heapless::String;

use crate::acquisition::{AcquisitionEnv, AcquisitionState, AcquisitionStateMachine, AcquisitionStep};
use crate::config::DISPLAY_ROW_CHARS;
use crate::discovery::{DiscoveryState, DiscoveryStateMachine, DiscoveryStep};
use crate::events::{Event, EventAggregator};
use crate::link::{ConnectionContext, GattClient, GattServer, LinkEvent};
use crate::notify::{Drained, NotificationQueue};
use crate::peripherals::{DisplayRow, SensorHardware, StatusDisplay};
use crate::thermo::{Millicelsius, TemperatureRecord};

/// Which side of the link this device plays.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeRole {
    /// Measures temperature and indicates it to the connected client.
    Server,
    /// Discovers the remote thermometer and arms its indications.
    Client,
}

impl NodeRole {
    /// Connection row text while no peer is connected.
    #[must_use]
    pub const fn idle_banner(self) -> &'static str {
        match self {
            NodeRole::Server => "Advertising",
            NodeRole::Client => "Discovering",
        }
    }
}

/// Effects of a single link event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStep {
    pub discovery: DiscoveryStep,
    /// Queued indication sent after a confirmation.
    pub drained: Option<Drained>,
    /// Reading decoded from a received temperature indication.
    pub remote_reading: Option<Millicelsius>,
}

impl LinkStep {
    const fn idle() -> Self {
        Self {
            discovery: DiscoveryStep::Ignored,
            drained: None,
            remote_reading: None,
        }
    }
}

pub struct Node<H, L, D> {
    role: NodeRole,
    hardware: H,
    link: L,
    display: D,
    context: ConnectionContext,
    queue: NotificationQueue,
    acquisition: AcquisitionStateMachine,
    discovery: DiscoveryStateMachine,
    remote_reading: Option<Millicelsius>,
}

impl<H, L, D> Node<H, L, D>
where
    H: SensorHardware,
    L: GattServer + GattClient,
    D: StatusDisplay,
{
    pub fn new(role: NodeRole, hardware: H, link: L, display: D) -> Self {
        Self {
            role,
            hardware,
            link,
            display,
            context: ConnectionContext::new(),
            queue: NotificationQueue::new(),
            acquisition: AcquisitionStateMachine::new(),
            discovery: DiscoveryStateMachine::new(),
            remote_reading: None,
        }
    }

    /// Paints the initial status rows.
    pub fn start(&mut self) {
        self.display
            .show(DisplayRow::Connection, self.role.idle_banner());
        self.display.clear(DisplayRow::Temperature);
    }

    pub const fn role(&self) -> NodeRole {
        self.role
    }

    pub const fn context(&self) -> &ConnectionContext {
        &self.context
    }

    pub const fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub const fn acquisition_state(&self) -> AcquisitionState {
        self.acquisition.state()
    }

    pub const fn discovery_state(&self) -> DiscoveryState {
        self.discovery.state()
    }

    pub const fn remote_reading(&self) -> Option<Millicelsius> {
        self.remote_reading
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Feeds one aggregator event to the acquisition sequence.
    ///
    /// Clients do not measure, so every event is ignored there.
    pub fn dispatch(&mut self, event: Event) -> AcquisitionStep {
        if self.role != NodeRole::Server {
            return AcquisitionStep::Ignored;
        }

        let mut env = AcquisitionEnv {
            hardware: &mut self.hardware,
            gatt: &mut self.link,
            display: &mut self.display,
            link: &mut self.context,
            queue: &mut self.queue,
        };
        self.acquisition.handle(event, &mut env)
    }

    /// Dequeues and dispatches the single highest-priority pending event.
    pub fn poll<W>(&mut self, events: &EventAggregator<W>) -> Option<(Event, AcquisitionStep)> {
        let event = events.dequeue()?;
        Some((event, self.dispatch(event)))
    }

    /// Dispatches pending events until the aggregator reports no work.
    ///
    /// Returns the number of events handled; the caller may sleep afterwards.
    pub fn run_until_idle<W>(&mut self, events: &EventAggregator<W>) -> usize {
        let mut handled = 0;
        while self.poll(events).is_some() {
            handled += 1;
        }
        handled
    }

    /// Applies a lifecycle or procedure signal from the radio stack.
    pub fn on_link_event(&mut self, event: LinkEvent) -> LinkStep {
        let mut step = LinkStep::idle();

        match &event {
            LinkEvent::ConnectionOpened(connection) => {
                self.context.connection = Some(*connection);
                self.context.indication_in_flight = false;
                self.display.show(DisplayRow::Connection, "Connected");
            }
            LinkEvent::ConnectionClosed => {
                self.context.reset();
                self.queue.clear();
                self.display
                    .show(DisplayRow::Connection, self.role.idle_banner());
                self.display.clear(DisplayRow::Temperature);
            }
            LinkEvent::IndicationsEnabled(enabled) => {
                self.context.indications_enabled = *enabled;
                if !*enabled {
                    // Nothing will confirm the outstanding indication or
                    // accept the queued ones.
                    self.context.indication_in_flight = false;
                    self.queue.clear();
                    self.display.clear(DisplayRow::Temperature);
                }
            }
            LinkEvent::IndicationConfirmed => {
                self.context.indication_in_flight = false;
                step.drained = self.queue.drain_if_idle(&mut self.context, &mut self.link);
            }
            LinkEvent::ServiceDiscovered(service) => {
                self.context.last_service = Some(*service);
            }
            LinkEvent::CharacteristicDiscovered(characteristic) => {
                self.context.last_characteristic = Some(*characteristic);
            }
            LinkEvent::ProcedureCompleted(_) => {}
            LinkEvent::IndicationReceived {
                characteristic,
                payload,
            } => {
                if self.context.thermometer.characteristic == Some(*characteristic) {
                    step.remote_reading = self.show_remote_reading(payload);
                }
            }
        }

        if self.role == NodeRole::Client {
            step.discovery = self.discovery.handle(
                &event,
                &mut self.link,
                &mut self.display,
                &mut self.context,
            );
            if matches!(event, LinkEvent::ConnectionClosed) {
                // A link lost mid-sequence restarts discovery from the first step too.
                self.discovery.reset();
            }
        }

        step
    }

    fn show_remote_reading(&mut self, payload: &[u8]) -> Option<Millicelsius> {
        let Some(reading) = TemperatureRecord::decode(payload) else {
            bridge_warn!("node: undecodable temperature indication len={}", payload.len());
            return None;
        };

        let mut text: String<DISPLAY_ROW_CHARS> = String::new();
        let _ = write!(text, "Temp={reading}");
        self.display.show(DisplayRow::Temperature, &text);
        self.remote_reading = Some(reading);
        Some(reading)
    }
}
