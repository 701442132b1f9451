//! Reading history and logging helpers.
//!
//! Keeps the most recent published readings in a fixed-capacity ring and
//! mirrors acquisition, link, and display activity to defmt on the target or
//! stdout on the host.

use bridge_core::acquisition::{AcquisitionStep, Delivery};
use bridge_core::config::DISPLAY_ROW_CHARS;
use bridge_core::discovery::DiscoveryStep;
use bridge_core::events::Event;
use bridge_core::node::LinkStep;
use bridge_core::peripherals::{DisplayRow, StatusDisplay};
use bridge_core::thermo::Millicelsius;
use embassy_time::Instant;
use heapless::{HistoryBuf, String};

/// Number of readings retained in memory.
pub const READING_HISTORY: usize = 32;

/// Identifier assigned to each published reading.
pub type ReadingId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadingRecord {
    pub id: ReadingId,
    pub timestamp: Instant,
    pub reading: Millicelsius,
    pub delivery: Delivery,
}

#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub struct Telemetry {
    ring: HistoryBuf<ReadingRecord, READING_HISTORY>,
    next_id: ReadingId,
    ignored: u32,
}

#[cfg_attr(not(target_os = "none"), allow(dead_code))]
impl Telemetry {
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_id: 0,
            ignored: 0,
        }
    }

    /// Readings in chronological order.
    #[cfg(test)]
    pub fn oldest_first(&self) -> heapless::history_buf::OldestOrdered<'_, ReadingRecord> {
        self.ring.oldest_ordered()
    }

    pub fn latest(&self) -> Option<&ReadingRecord> {
        self.ring.recent()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Events that did not match the acquisition state.
    #[cfg(test)]
    pub fn ignored_events(&self) -> u32 {
        self.ignored
    }

    /// Records the outcome of one dispatched event.
    pub fn record_step(&mut self, event: Event, step: &AcquisitionStep, timestamp: Instant) {
        match step {
            AcquisitionStep::Ignored => {
                self.ignored = self.ignored.wrapping_add(1);
                emit_ignored(event.label());
            }
            AcquisitionStep::Advanced(_) => {}
            AcquisitionStep::Completed(publication) => {
                let id = self.next_id;
                self.next_id = self.next_id.wrapping_add(1);
                self.ring.write(ReadingRecord {
                    id,
                    timestamp,
                    reading: publication.reading,
                    delivery: publication.delivery,
                });
                if let Some(record) = self.latest() {
                    emit_reading(
                        record.id,
                        record.reading.as_i32(),
                        delivery_label(record.delivery),
                        record.timestamp.as_micros(),
                    );
                }
            }
        }
    }

    /// Logs the effects of a link event.
    pub fn record_link(&mut self, label: &'static str, step: &LinkStep) {
        let ordinal = match step.discovery {
            DiscoveryStep::Advanced { state, .. } => Some(state.ordinal()),
            DiscoveryStep::Ignored => None,
        };
        emit_link(label, ordinal, step.drained.is_some());
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// Status rows rendered as log lines; repeats of the current text are skipped.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub struct LogDisplay {
    connection: String<DISPLAY_ROW_CHARS>,
    temperature: String<DISPLAY_ROW_CHARS>,
}

#[cfg_attr(not(target_os = "none"), allow(dead_code))]
impl LogDisplay {
    pub const fn new() -> Self {
        Self {
            connection: String::new(),
            temperature: String::new(),
        }
    }

    #[cfg(test)]
    pub fn row(&self, row: DisplayRow) -> &str {
        match row {
            DisplayRow::Connection => &self.connection,
            DisplayRow::Temperature => &self.temperature,
        }
    }
}

impl Default for LogDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDisplay for LogDisplay {
    fn show(&mut self, row: DisplayRow, text: &str) {
        let target = match row {
            DisplayRow::Connection => &mut self.connection,
            DisplayRow::Temperature => &mut self.temperature,
        };
        if target.as_str() == text {
            return;
        }

        target.clear();
        for ch in text.chars() {
            if target.push(ch).is_err() {
                break;
            }
        }
        emit_display(row.label(), target.as_str());
    }
}

const fn delivery_label(delivery: Delivery) -> &'static str {
    match delivery {
        Delivery::Sent(Ok(())) => "sent",
        Delivery::Sent(Err(_)) => "send-failed",
        Delivery::Queued => "queued",
        Delivery::Dropped(_) => "dropped",
        Delivery::Suppressed => "suppressed",
    }
}

#[cfg(target_os = "none")]
fn emit_reading(id: ReadingId, millicelsius: i32, delivery: &'static str, timestamp_us: u64) {
    defmt::info!(
        "telemetry:reading #{} {}mC {} t={}us",
        id,
        millicelsius,
        delivery,
        timestamp_us
    );
}

#[cfg(not(target_os = "none"))]
fn emit_reading(id: ReadingId, millicelsius: i32, delivery: &'static str, timestamp_us: u64) {
    println!("telemetry:reading #{id} {millicelsius}mC {delivery} t={timestamp_us}us");
}

#[cfg(target_os = "none")]
fn emit_ignored(event: &'static str) {
    defmt::debug!("telemetry:ignored {}", event);
}

#[cfg(not(target_os = "none"))]
fn emit_ignored(event: &'static str) {
    println!("telemetry:ignored {event}");
}

#[cfg(target_os = "none")]
fn emit_link(label: &'static str, discovery_step: Option<u8>, drained: bool) {
    match discovery_step {
        Some(step) => defmt::info!("telemetry:link {} discovery={} drained={}", label, step, drained),
        None => defmt::info!("telemetry:link {} drained={}", label, drained),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_link(label: &'static str, discovery_step: Option<u8>, drained: bool) {
    match discovery_step {
        Some(step) => println!("telemetry:link {label} discovery={step} drained={drained}"),
        None => println!("telemetry:link {label} drained={drained}"),
    }
}

#[cfg(target_os = "none")]
fn emit_display(row: &'static str, text: &str) {
    defmt::info!("display:{} \"{}\"", row, text);
}

#[cfg(not(target_os = "none"))]
fn emit_display(row: &'static str, text: &str) {
    println!("display:{row} {text:?}");
}
