//! Prioritised aggregation of interrupt-sourced events.
//!
//! Interrupt handlers call [`EventAggregator::raise`]; the process loop calls
//! [`EventAggregator::dequeue`] until it reports no work and then lets the MCU
//! sleep. Pending events live in a single bitmask, so repeated occurrences of
//! the same event before it is consumed coalesce into one flag.
//!
//! The bitmask is a `portable_atomic::AtomicU32`: on cores with native CAS the
//! read-modify-write is lock-free, on cores without it `portable-atomic` routes
//! through the `critical-section` implementation, which masks interrupts for
//! the duration of the update.

use core::fmt;

use portable_atomic::{AtomicU32, Ordering};

/// Asynchronous hardware occurrences consumed by the process loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Periodic low-energy timer wrapped around; starts a new measurement.
    TimerUnderflow,
    /// One-shot delay armed through [`DelayTimer`](crate::peripherals::DelayTimer) expired.
    TimerCompareMatch,
    /// Interrupt-driven bus write or read finished.
    BusTransferComplete,
}

impl Event {
    /// Dequeue order, highest priority first.
    pub const PRIORITY: [Event; 3] = [
        Event::BusTransferComplete,
        Event::TimerCompareMatch,
        Event::TimerUnderflow,
    ];

    /// Bit position used for this event inside an [`EventSet`].
    #[must_use]
    pub const fn bit_position(self) -> u32 {
        match self {
            Event::TimerUnderflow => 0,
            Event::TimerCompareMatch => 1,
            Event::BusTransferComplete => 2,
        }
    }

    /// Single-bit mask for this event.
    #[must_use]
    pub const fn mask(self) -> u32 {
        1 << self.bit_position()
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Event::TimerUnderflow => "timer-underflow",
            Event::TimerCompareMatch => "timer-compare",
            Event::BusTransferComplete => "bus-complete",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fixed-width set of pending event flags.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EventSet(u32);

impl EventSet {
    pub const EMPTY: Self = Self(0);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, event: Event) -> bool {
        self.0 & event.mask() != 0
    }

    #[must_use]
    pub const fn with(self, event: Event) -> Self {
        Self(self.0 | event.mask())
    }

    #[must_use]
    pub const fn without(self, event: Event) -> Self {
        Self(self.0 & !event.mask())
    }

    /// Highest-priority event present in the set, if any.
    #[must_use]
    pub fn highest_priority(self) -> Option<Event> {
        Event::PRIORITY
            .iter()
            .copied()
            .find(|event| self.contains(*event))
    }
}

/// Hook used to wake the process loop after an event is raised.
///
/// Implementations must be callable from interrupt context and complete in
/// bounded time.
pub trait WakeSignal {
    fn wake(&self, event: Event);
}

impl<W: WakeSignal + ?Sized> WakeSignal for &W {
    fn wake(&self, event: Event) {
        (**self).wake(event);
    }
}

/// Wake signal for loops that poll unconditionally.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopWake;

impl NoopWake {
    pub const fn new() -> Self {
        Self
    }
}

impl WakeSignal for NoopWake {
    fn wake(&self, _: Event) {}
}

/// Shared pending-event set written from interrupts and drained by the process loop.
pub struct EventAggregator<W = NoopWake> {
    pending: AtomicU32,
    wake: W,
}

impl<W> EventAggregator<W> {
    /// Creates an aggregator with no pending events.
    pub const fn new(wake: W) -> Self {
        Self {
            pending: AtomicU32::new(0),
            wake,
        }
    }

    /// Returns the wake hook, so the process loop can await it.
    pub fn wake_signal(&self) -> &W {
        &self.wake
    }

    /// Resolves and clears the single highest-priority pending event.
    ///
    /// Lower-priority events stay pending for the next call. Returns `None`
    /// without touching the set when nothing is pending. Must only be called
    /// from the process loop.
    pub fn dequeue(&self) -> Option<Event> {
        let mut resolved = None;
        // The closure may run more than once under contention; `resolved`
        // always reflects the attempt that was committed.
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let set = EventSet::from_bits(bits);
                resolved = set.highest_priority();
                resolved.map(|event| set.without(event).bits())
            });
        resolved
    }
}

impl<W: WakeSignal> EventAggregator<W> {
    /// Marks `event` pending and wakes the process loop. Safe from any interrupt.
    pub fn raise(&self, event: Event) {
        self.pending.fetch_or(event.mask(), Ordering::AcqRel);
        self.wake.wake(event);
    }
}

impl Default for EventAggregator<NoopWake> {
    fn default() -> Self {
        Self::new(NoopWake::new())
    }
}
