//! Process-loop wake-up shared with the interrupt-side producers.

use bridge_core::events::{Event, EventAggregator, WakeSignal};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Aggregator type shared by every producer on the board.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub type LoopEvents = EventAggregator<LoopWake>;

/// Level-triggered wake flag; any number of raises collapse into one wake.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub struct LoopWake {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

#[cfg_attr(not(target_os = "none"), allow(dead_code))]
impl LoopWake {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Suspends until at least one event was raised since the last wait.
    pub async fn wait(&self) {
        self.signal.wait().await;
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.signal.signaled()
    }
}

impl Default for LoopWake {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeSignal for LoopWake {
    fn wake(&self, _: Event) {
        self.signal.signal(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn raise_wakes_the_loop_once() {
        let events = LoopEvents::new(LoopWake::new());
        assert!(!events.wake_signal().is_pending());

        events.raise(Event::TimerUnderflow);
        events.raise(Event::BusTransferComplete);
        assert!(events.wake_signal().is_pending());

        block_on(events.wake_signal().wait());
        assert!(!events.wake_signal().is_pending());
        assert_eq!(events.dequeue(), Some(Event::BusTransferComplete));
        assert_eq!(events.dequeue(), Some(Event::TimerUnderflow));
        assert_eq!(events.dequeue(), None);
    }
}
