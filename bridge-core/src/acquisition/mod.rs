//! Temperature acquisition sequence.
//!
//! Each measurement walks the Si7021 through power-up, a measure command, the
//! conversion delay, and a read-back, then publishes the encoded reading:
//!
//! ```text
//! Idle --underflow--> AwaitingPowerOnReset --compare--> AwaitingWriteComplete
//!   ^                                                          |
//!   |                                                     bus-complete
//! bus-complete                                                 v
//! AwaitingReadComplete <--compare-- AwaitingConversion <-------'
//! ```
//!
//! [`AcquisitionState::on_event`] is the pure transition table; the machine
//! applies the resulting [`AcquisitionAction`] against the collaborators.
//! Events that do not match the current state are ignored, which makes
//! coalesced or stray interrupts harmless.

use core::fmt::{self, Write as _};

use heapless::String;

use crate::config::{
    DISPLAY_ROW_CHARS, LOCAL_TEMPERATURE_ATTRIBUTE, SI7021_ADDRESS,
    SI7021_CMD_MEASURE_TEMP_NO_HOLD, SI7021_CONVERSION_TIME, SI7021_POWER_ON_RESET,
};
use crate::events::Event;
use crate::link::{ConnectionContext, GattServer, LinkResult};
use crate::notify::{Drained, NotificationEntry, NotificationQueue, QueueFull};
use crate::peripherals::{DisplayRow, PowerState, SensorHardware, StatusDisplay};
use crate::thermo::{Millicelsius, TemperatureRecord, TemperatureSample};

/// Position within the acquisition sequence.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionState {
    #[default]
    Idle,
    AwaitingPowerOnReset,
    AwaitingWriteComplete,
    AwaitingConversion,
    AwaitingReadComplete,
}

impl AcquisitionState {
    /// Event that advances the sequence out of this state.
    #[must_use]
    pub const fn expected_event(self) -> Event {
        match self {
            AcquisitionState::Idle => Event::TimerUnderflow,
            AcquisitionState::AwaitingPowerOnReset | AcquisitionState::AwaitingConversion => {
                Event::TimerCompareMatch
            }
            AcquisitionState::AwaitingWriteComplete | AcquisitionState::AwaitingReadComplete => {
                Event::BusTransferComplete
            }
        }
    }

    /// Pure transition table.
    #[must_use]
    pub fn on_event(self, event: Event) -> Transition {
        if event != self.expected_event() {
            return Transition::stay(self);
        }

        match self {
            AcquisitionState::Idle => Transition::to(
                AcquisitionState::AwaitingPowerOnReset,
                AcquisitionAction::PowerOnSensor,
            ),
            AcquisitionState::AwaitingPowerOnReset => Transition::to(
                AcquisitionState::AwaitingWriteComplete,
                AcquisitionAction::WriteMeasureCommand,
            ),
            AcquisitionState::AwaitingWriteComplete => Transition::to(
                AcquisitionState::AwaitingConversion,
                AcquisitionAction::ArmConversionDelay,
            ),
            AcquisitionState::AwaitingConversion => Transition::to(
                AcquisitionState::AwaitingReadComplete,
                AcquisitionAction::ReadResult,
            ),
            AcquisitionState::AwaitingReadComplete => {
                Transition::to(AcquisitionState::Idle, AcquisitionAction::Publish)
            }
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            AcquisitionState::Idle => "idle",
            AcquisitionState::AwaitingPowerOnReset => "await-por",
            AcquisitionState::AwaitingWriteComplete => "await-write",
            AcquisitionState::AwaitingConversion => "await-conversion",
            AcquisitionState::AwaitingReadComplete => "await-read",
        }
    }
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Side effect requested by a transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionAction {
    /// Power the sensor and arm the power-on-reset delay.
    PowerOnSensor,
    /// Start the measure command write.
    WriteMeasureCommand,
    /// Mask the bus interrupt and arm the conversion delay.
    ArmConversionDelay,
    /// Start the result read.
    ReadResult,
    /// Mask the bus interrupt, power down, convert, and publish.
    Publish,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub next: AcquisitionState,
    pub action: Option<AcquisitionAction>,
}

impl Transition {
    const fn stay(state: AcquisitionState) -> Self {
        Self {
            next: state,
            action: None,
        }
    }

    const fn to(next: AcquisitionState, action: AcquisitionAction) -> Self {
        Self {
            next,
            action: Some(action),
        }
    }
}

/// How a finished reading left the device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// Indication handed to the link; the status is the link's answer.
    Sent(LinkResult),
    /// Another indication was outstanding or older readings were waiting;
    /// the record joined the queue behind them.
    Queued,
    /// Queue was full; the reading was dropped.
    Dropped(QueueFull),
    /// No connection or indications disabled; nothing was published.
    Suppressed,
}

/// Result of the terminal publish step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Publication {
    pub sample: TemperatureSample,
    pub reading: Millicelsius,
    pub record: TemperatureRecord,
    pub attribute_status: LinkResult,
    pub delivery: Delivery,
    /// Older entries pushed out right after this reading was queued.
    pub drained: Option<Drained>,
}

/// Outcome of feeding one event to the machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionStep {
    /// Event did not match the current state.
    Ignored,
    /// Sequence moved to the contained state.
    Advanced(AcquisitionState),
    /// Sequence finished a measurement and returned to idle.
    Completed(Publication),
}

/// Collaborators borrowed for the duration of one step.
pub struct AcquisitionEnv<'a, H, G, D> {
    pub hardware: &'a mut H,
    pub gatt: &'a mut G,
    pub display: &'a mut D,
    pub link: &'a mut ConnectionContext,
    pub queue: &'a mut NotificationQueue,
}

#[derive(Debug, Default)]
pub struct AcquisitionStateMachine {
    state: AcquisitionState,
}

impl AcquisitionStateMachine {
    pub const fn new() -> Self {
        Self {
            state: AcquisitionState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Applies one dequeued event.
    ///
    /// Link failures while publishing are reported in the returned
    /// [`Publication`] and never keep the machine from returning to idle.
    pub fn handle<H, G, D>(
        &mut self,
        event: Event,
        env: &mut AcquisitionEnv<'_, H, G, D>,
    ) -> AcquisitionStep
    where
        H: SensorHardware,
        G: GattServer,
        D: StatusDisplay,
    {
        let transition = self.state.on_event(event);
        self.state = transition.next;

        match transition.action {
            None => AcquisitionStep::Ignored,
            Some(AcquisitionAction::Publish) => AcquisitionStep::Completed(publish(env)),
            Some(action) => {
                perform(action, env.hardware);
                AcquisitionStep::Advanced(transition.next)
            }
        }
    }
}

fn perform<H: SensorHardware>(action: AcquisitionAction, hardware: &mut H) {
    match action {
        AcquisitionAction::PowerOnSensor => {
            hardware.set_sensor_power(PowerState::On);
            hardware.arm_delay(SI7021_POWER_ON_RESET);
        }
        AcquisitionAction::WriteMeasureCommand => {
            hardware.start_write(SI7021_ADDRESS, SI7021_CMD_MEASURE_TEMP_NO_HOLD);
        }
        AcquisitionAction::ArmConversionDelay => {
            hardware.disable_interrupt();
            hardware.arm_delay(SI7021_CONVERSION_TIME);
        }
        AcquisitionAction::ReadResult => hardware.start_read(SI7021_ADDRESS),
        AcquisitionAction::Publish => {}
    }
}

fn publish<H, G, D>(env: &mut AcquisitionEnv<'_, H, G, D>) -> Publication
where
    H: SensorHardware,
    G: GattServer,
    D: StatusDisplay,
{
    env.hardware.disable_interrupt();
    env.hardware.set_sensor_power(PowerState::Off);

    let sample = TemperatureSample(env.hardware.last_read());
    let reading = sample.millicelsius();
    let record = TemperatureRecord::from_millicelsius(reading);

    let attribute_status =
        env.gatt
            .write_attribute(LOCAL_TEMPERATURE_ATTRIBUTE, 0, record.as_bytes());
    if let Err(status) = attribute_status {
        bridge_warn!("acquisition: attribute write failed {}", status);
    }

    let connection = if env.link.can_publish() {
        env.link.connection
    } else {
        None
    };

    let mut drained = None;
    let delivery = match connection {
        Some(connection) => {
            let delivery = if !env.link.indication_in_flight && env.queue.is_empty() {
                let status = env.gatt.send_indication(
                    connection,
                    LOCAL_TEMPERATURE_ATTRIBUTE,
                    record.as_bytes(),
                );
                match status {
                    Ok(()) => env.link.indication_in_flight = true,
                    Err(status) => bridge_warn!("acquisition: indication failed {}", status),
                }
                Delivery::Sent(status)
            } else {
                let delivery = enqueue(env.queue, &record);
                drained = env.queue.drain_if_idle(&mut *env.link, &mut *env.gatt);
                delivery
            };

            let mut text: String<DISPLAY_ROW_CHARS> = String::new();
            let _ = write!(text, "Temp={reading}");
            env.display.show(DisplayRow::Temperature, &text);
            delivery
        }
        None => {
            env.display.clear(DisplayRow::Temperature);
            Delivery::Suppressed
        }
    };

    bridge_debug!("acquisition: reading {} mC", reading.as_i32());

    Publication {
        sample,
        reading,
        record,
        attribute_status,
        delivery,
        drained,
    }
}

fn enqueue(queue: &mut NotificationQueue, record: &TemperatureRecord) -> Delivery {
    match queue.enqueue(NotificationEntry::from_record(LOCAL_TEMPERATURE_ATTRIBUTE, record)) {
        Ok(()) => Delivery::Queued,
        Err(full) => {
            bridge_warn!("acquisition: dropping reading, {} entries queued", queue.depth());
            Delivery::Dropped(full)
        }
    }
}
