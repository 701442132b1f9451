//! Console command grammar for the emulator.

use std::fmt;

use bridge_core::events::Event;
use winnow::ascii::{dec_uint, hex_uint, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded, terminated};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::rest;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command<'a> {
    /// Periodic timer underflow; starts a measurement.
    Tick,
    /// Completes whatever timer or bus operation the sensor is waiting on.
    Step,
    /// Tick, then step until the measurement is published.
    Measure,
    /// Marks an event pending without running the loop.
    Raise(Event),
    /// Drains the aggregator.
    Run,
    /// Sets the raw code the sensor returns on the next read.
    Sensor(u16),
    Connect(u8),
    Disconnect,
    Indications(bool),
    Confirm,
    /// Finishes the outstanding client procedure.
    Complete { found: bool },
    /// Delivers a remote temperature indication carrying the given raw code.
    Remote(u16),
    Status,
    Help(Option<&'a str>),
}

/// Line did not match the grammar; `offset` points at the first bad byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyntaxError {
    pub offset: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized input at column {}", self.offset + 1)
    }
}

pub fn parse(line: &str) -> Result<Command<'_>, SyntaxError> {
    terminated(command, (space0, eof))
        .parse(line.trim())
        .map_err(|err| SyntaxError {
            offset: err.offset(),
        })
}

fn command<'a>(input: &mut &'a str) -> Result<Command<'a>, ContextError> {
    alt((
        "tick".value(Command::Tick),
        "step".value(Command::Step),
        "measure".value(Command::Measure),
        preceded(("raise", space1), event).map(Command::Raise),
        "run".value(Command::Run),
        preceded(("sensor", space1), code).map(Command::Sensor),
        preceded(("connect", space1), connection).map(Command::Connect),
        "disconnect".value(Command::Disconnect),
        preceded(("indications", space1), switch).map(Command::Indications),
        "confirm".value(Command::Confirm),
        preceded("complete", opt(preceded(space1, outcome)))
            .map(|found| Command::Complete {
                found: found.unwrap_or(true),
            }),
        preceded(("remote", space1), code).map(Command::Remote),
        "status".value(Command::Status),
        preceded("help", opt(preceded(space1, rest))).map(|topic| {
            Command::Help(topic.map(str::trim).filter(|topic| !topic.is_empty()))
        }),
    ))
    .parse_next(input)
}

fn event(input: &mut &str) -> Result<Event, ContextError> {
    alt((
        "underflow".value(Event::TimerUnderflow),
        "compare".value(Event::TimerCompareMatch),
        "bus".value(Event::BusTransferComplete),
    ))
    .parse_next(input)
}

fn switch(input: &mut &str) -> Result<bool, ContextError> {
    alt(("on".value(true), "off".value(false))).parse_next(input)
}

fn outcome(input: &mut &str) -> Result<bool, ContextError> {
    alt(("found".value(true), "missing".value(false))).parse_next(input)
}

fn code(input: &mut &str) -> Result<u16, ContextError> {
    alt((preceded(alt(("0x", "0X")), hex_uint), dec_uint)).parse_next(input)
}

fn connection(input: &mut &str) -> Result<u8, ContextError> {
    dec_uint.parse_next(input)
}
