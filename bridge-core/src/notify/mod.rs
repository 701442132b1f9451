//! Bounded FIFO of indications waiting for the link to become idle.
//!
//! Only one indication may be outstanding at a time. Readings produced while
//! one is in flight are copied into this queue and sent one by one as the peer
//! confirms the previous indication. When the queue is full, new entries are
//! rejected and the queued ones are kept. Entries the link refuses are
//! discarded so the rest of the queue keeps moving.

use core::fmt;

use heapless::{Deque, Vec};

use crate::config::NOTIFICATION_QUEUE_DEPTH;
use crate::link::{AttributeHandle, ConnectionContext, GattServer, LinkResult};
use crate::thermo::{RECORD_LEN, TemperatureRecord};

/// Maximum payload carried by a queued indication.
pub const MAX_NOTIFICATION_PAYLOAD: usize = RECORD_LEN;

/// Returned when the queue has no free slot; the rejected entry is dropped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull;

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("notification queue full")
    }
}

/// Payload longer than [`MAX_NOTIFICATION_PAYLOAD`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PayloadTooLong {
    pub len: usize,
}

/// Owned copy of an outbound indication.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotificationEntry {
    handle: AttributeHandle,
    payload: Vec<u8, MAX_NOTIFICATION_PAYLOAD>,
}

impl NotificationEntry {
    pub fn new(handle: AttributeHandle, payload: &[u8]) -> Result<Self, PayloadTooLong> {
        let payload = Vec::from_slice(payload).map_err(|_| PayloadTooLong { len: payload.len() })?;
        Ok(Self { handle, payload })
    }

    #[must_use]
    pub const fn from_record(handle: AttributeHandle, record: &TemperatureRecord) -> Self {
        Self {
            handle,
            payload: Vec::from_array(*record.as_bytes()),
        }
    }

    #[must_use]
    pub const fn handle(&self) -> AttributeHandle {
        self.handle
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Result of handing queued entries to the link.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Drained {
    /// Handle of the last entry offered to the link.
    pub handle: AttributeHandle,
    /// Link answer for that entry.
    pub status: LinkResult,
    /// Entries the link refused; they are gone from the queue.
    pub discarded: usize,
}

pub struct NotificationQueue {
    entries: Deque<NotificationEntry, NOTIFICATION_QUEUE_DEPTH>,
}

impl NotificationQueue {
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    /// Appends a copy of `entry`. A full queue rejects it and keeps its depth.
    pub fn enqueue(&mut self, entry: NotificationEntry) -> Result<(), QueueFull> {
        self.entries.push_back(entry).map_err(|_| QueueFull)
    }

    /// Number of queued indications.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        NOTIFICATION_QUEUE_DEPTH
    }

    /// Drops every queued entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Sends the oldest entry when indications are armed and nothing is in flight.
    ///
    /// Called when the peer confirms an indication and after a reading was
    /// queued behind older ones. An accepted send marks the context in flight.
    /// A refused entry is dropped and the next one is offered, until the link
    /// accepts one or the queue runs empty, so entries never sit in the queue
    /// without an outstanding indication to wait for.
    pub fn drain_if_idle<G: GattServer>(
        &mut self,
        link: &mut ConnectionContext,
        gatt: &mut G,
    ) -> Option<Drained> {
        if link.indication_in_flight || !link.can_publish() {
            return None;
        }
        let connection = link.connection?;

        let mut discarded = 0;
        while let Some(entry) = self.entries.pop_front() {
            let status = gatt.send_indication(connection, entry.handle, entry.payload());
            match status {
                Ok(()) => link.indication_in_flight = true,
                Err(status) => {
                    bridge_warn!("notify: queued indication rejected {}", status);
                    discarded += 1;
                }
            }

            if status.is_ok() || self.entries.is_empty() {
                return Some(Drained {
                    handle: entry.handle,
                    status,
                    discarded,
                });
            }
        }
        None
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}
