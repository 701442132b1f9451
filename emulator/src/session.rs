use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant as HostInstant};

use bridge_core::acquisition::{AcquisitionState, AcquisitionStep, Delivery};
use bridge_core::discovery::DiscoveryStep;
use bridge_core::events::{Event, EventAggregator, WakeSignal};
use bridge_core::link::{LinkEvent, LinkResult};
use bridge_core::node::{LinkStep, Node, NodeRole};
use bridge_core::notify::Drained;
use bridge_core::peripherals::DisplayRow;
use bridge_core::thermo::TemperatureSample;

use crate::command::{self, Command};
use crate::sim::{SimDisplay, SimHardware, SimLink};

/// A measurement never needs more than this many completions after the tick.
const MAX_MEASURE_STEPS: usize = 8;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("tick", "tick                          - timer underflow, starts a measurement"),
    ("step", "step                          - finish the pending timer or bus operation"),
    ("measure", "measure                       - tick, then step until published"),
    ("raise", "raise <underflow|compare|bus>  - mark an interrupt pending"),
    ("run", "run                           - drain pending events"),
    ("sensor", "sensor <raw>                  - set the Si7021 raw code (hex or decimal)"),
    ("connect", "connect <handle>              - peer opens a connection"),
    ("disconnect", "disconnect                    - peer closes the connection"),
    ("indications", "indications <on|off>          - peer writes the client configuration"),
    ("confirm", "confirm                       - peer confirms the outstanding indication"),
    ("complete", "complete [found|missing]      - remote answers the client procedure"),
    ("remote", "remote <raw>                  - remote thermometer indicates a reading"),
    ("status", "status                        - show node state"),
    ("help", "help [topic]                  - show help for a command"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("server") {
            Ok(Self::Server)
        } else if tag.eq_ignore_ascii_case("client") {
            Ok(Self::Client)
        } else {
            Err(format!("Unknown role `{tag}`"))
        }
    }

    fn node_role(self) -> NodeRole {
        match self {
            Role::Server => NodeRole::Server,
            Role::Client => NodeRole::Client,
        }
    }

    fn header(self) -> &'static str {
        match self {
            Role::Server => "Sensor Bridge Emulator server transcript",
            Role::Client => "Sensor Bridge Emulator client transcript",
        }
    }
}

/// Counts process-loop wake-ups requested by raised events.
#[derive(Default)]
pub struct WakeCounter {
    wakes: Cell<usize>,
}

impl WakeCounter {
    pub fn count(&self) -> usize {
        self.wakes.get()
    }
}

impl WakeSignal for WakeCounter {
    fn wake(&self, _: Event) {
        self.wakes.set(self.wakes.get() + 1);
    }
}

pub struct Session {
    node: Node<SimHardware, SimLink, SimDisplay>,
    events: EventAggregator<WakeCounter>,
    transcript: Option<TranscriptLogger>,
    started_at: HostInstant,
    published: usize,
}

impl Session {
    pub fn new(role: Role, transcript: Option<PathBuf>) -> io::Result<Self> {
        let transcript = match transcript {
            Some(path) => Some(TranscriptLogger::new(&path, role)?),
            None => None,
        };

        let mut node = Node::new(
            role.node_role(),
            SimHardware::new(),
            SimLink::new(),
            SimDisplay::default(),
        );
        node.start();

        Ok(Self {
            node,
            events: EventAggregator::new(WakeCounter::default()),
            transcript,
            started_at: HostInstant::now(),
            published: 0,
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(elapsed, TranscriptRole::Host, trimmed)?;
        }

        let lines = match command::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        if let Some(transcript) = self.transcript.as_mut() {
            for line in &lines {
                transcript.append_line(elapsed, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        match command {
            Command::Tick => {
                self.events.raise(Event::TimerUnderflow);
                self.run()
            }
            Command::Step => self.step(),
            Command::Measure => self.measure(),
            Command::Raise(event) => {
                self.events.raise(event);
                vec![format!("OK raised {event}")]
            }
            Command::Run => self.run(),
            Command::Sensor(raw) => {
                self.node.hardware_mut().set_raw_code(raw);
                let reading = TemperatureSample(raw).millicelsius();
                vec![format!("OK sensor raw=0x{raw:04X} temp={reading}")]
            }
            Command::Connect(connection) => {
                self.node.link_mut().set_connection(Some(connection));
                self.link_event(LinkEvent::ConnectionOpened(connection))
            }
            Command::Disconnect => {
                self.node.link_mut().set_connection(None);
                self.link_event(LinkEvent::ConnectionClosed)
            }
            Command::Indications(enabled) => {
                if !self.node.context().is_open() {
                    return vec!["ERR not connected".to_string()];
                }
                self.link_event(LinkEvent::IndicationsEnabled(enabled))
            }
            Command::Confirm => {
                if !self.node.context().indication_in_flight {
                    return vec!["ERR no indication outstanding".to_string()];
                }
                self.link_event(LinkEvent::IndicationConfirmed)
            }
            Command::Complete { found } => self.complete(found),
            Command::Remote(raw) => self.remote(raw),
            Command::Status => self.status(),
            Command::Help(topic) => help(topic),
        }
    }

    fn run(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some((event, step)) = self.node.poll(&self.events) {
            lines.push(self.describe_acquisition(event, step));
        }
        if lines.is_empty() {
            lines.push("OK idle".to_string());
        }
        lines
    }

    fn step(&mut self) -> Vec<String> {
        let Some((pending, event)) = self.node.hardware_mut().complete_pending() else {
            return vec!["ERR no hardware operation pending".to_string()];
        };
        self.events.raise(event);

        let mut lines = vec![format!("OK completed {pending:?}")];
        lines.extend(self.run());
        lines
    }

    fn measure(&mut self) -> Vec<String> {
        self.events.raise(Event::TimerUnderflow);
        let mut lines = self.run();
        for _ in 0..MAX_MEASURE_STEPS {
            if self.node.acquisition_state() == AcquisitionState::Idle {
                break;
            }
            lines.extend(self.step());
        }
        lines
    }

    fn complete(&mut self, found: bool) -> Vec<String> {
        let Some(events) = self.node.link_mut().answer(found) else {
            return vec!["ERR no procedure outstanding".to_string()];
        };

        let mut lines = Vec::new();
        for event in events {
            lines.extend(self.link_event(event));
        }
        lines
    }

    fn remote(&mut self, raw: u16) -> Vec<String> {
        let Some(characteristic) = self.node.context().thermometer.characteristic else {
            return vec!["ERR thermometer characteristic not discovered".to_string()];
        };

        let record = TemperatureSample(raw).record();
        let Ok(payload) = heapless::Vec::from_slice(record.as_bytes()) else {
            return vec!["ERR record does not fit".to_string()];
        };
        self.link_event(LinkEvent::IndicationReceived {
            characteristic,
            payload,
        })
    }

    fn link_event(&mut self, event: LinkEvent) -> Vec<String> {
        let label = event.label();
        let step = self.node.on_link_event(event);
        describe_link_step(label, &step)
    }

    fn describe_acquisition(&mut self, event: Event, step: AcquisitionStep) -> String {
        match step {
            AcquisitionStep::Ignored => format!("{event}: ignored"),
            AcquisitionStep::Advanced(state) => format!("{event}: -> {state}"),
            AcquisitionStep::Completed(publication) => {
                self.published += 1;
                let mut line = format!(
                    "{event}: published raw=0x{:04X} temp={} record={} {}",
                    publication.sample.0,
                    publication.reading,
                    hex(publication.record.as_bytes()),
                    describe_delivery(publication.delivery),
                );
                if let Some(drained) = publication.drained {
                    line.push_str(", drained ");
                    line.push_str(&describe_drained(drained));
                }
                line
            }
        }
    }

    fn status(&self) -> Vec<String> {
        let context = self.node.context();
        let hardware = self.node.hardware();
        let link = self.node.link();
        let display = self.node.display();

        let mut lines = vec![
            format!(
                "role={:?} acquisition={} discovery={}",
                self.node.role(),
                self.node.acquisition_state(),
                self.node.discovery_state()
            ),
            format!(
                "connection={} indications={} in-flight={} queued={}/{}",
                context
                    .connection
                    .map_or_else(|| "none".to_string(), |handle| handle.to_string()),
                on_off(context.indications_enabled),
                context.indication_in_flight,
                self.node.queue().depth(),
                self.node.queue().capacity()
            ),
            format!(
                "sensor raw=0x{:04X} power={:?} cycles={} pending={:?} sim-time={}ms",
                hardware.raw_code(),
                hardware.power(),
                hardware.power_cycles(),
                hardware.pending(),
                hardware.elapsed().as_millis()
            ),
            format!(
                "published={} indications-sent={} attribute={} wakes={}",
                self.published,
                link.indications().len(),
                hex(link.attribute()),
                self.events.wake_signal().count()
            ),
            format!("display[connection]={:?}", display.row(DisplayRow::Connection)),
            format!("display[temperature]={:?}", display.row(DisplayRow::Temperature)),
        ];

        if self.node.role() == NodeRole::Client {
            lines.push(format!(
                "thermometer={:?} button={:?} pending={:?} remote={}",
                context.thermometer,
                context.button,
                link.pending(),
                self.node
                    .remote_reading()
                    .map_or_else(|| "none".to_string(), |reading| reading.to_string())
            ));
        }
        lines
    }
}

fn help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_link_step(label: &str, step: &LinkStep) -> Vec<String> {
    let mut lines = vec![format!("OK {label}")];
    if let DiscoveryStep::Advanced { state, request } = step.discovery {
        let request = request.map_or_else(|| "none".to_string(), describe_result);
        lines.push(format!("  discovery -> {state} request={request}"));
    }
    if let Some(drained) = step.drained {
        lines.push(format!(
            "  drained queued indication {}",
            describe_drained(drained)
        ));
    }
    if let Some(reading) = step.remote_reading {
        lines.push(format!("  remote temp={reading}"));
    }
    lines
}

fn describe_delivery(delivery: Delivery) -> String {
    match delivery {
        Delivery::Sent(status) => format!("sent {}", describe_result(status)),
        Delivery::Queued => "queued".to_string(),
        Delivery::Dropped(full) => format!("dropped ({full})"),
        Delivery::Suppressed => "suppressed".to_string(),
    }
}

fn describe_drained(drained: Drained) -> String {
    let status = describe_result(drained.status);
    if drained.discarded == 0 {
        status
    } else {
        format!("{status} ({} discarded)", drained.discarded)
    }
}

fn describe_result(result: LinkResult) -> String {
    match result {
        Ok(()) => "ok".to_string(),
        Err(status) => status.to_string(),
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "-".to_string();
    }
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, role: Role) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        writeln!(logger.writer, "# {}", role.header())?;
        writeln!(
            logger.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
