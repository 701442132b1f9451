use bridge_core::events::Event;
use embassy_time::Ticker;

use super::MEASUREMENT_PERIOD;
use crate::wake::LoopEvents;

/// Periodic underflow that starts each measurement.
#[embassy_executor::task]
pub async fn run(events: &'static LoopEvents) -> ! {
    let mut ticker = Ticker::every(MEASUREMENT_PERIOD);
    loop {
        ticker.next().await;
        events.raise(Event::TimerUnderflow);
    }
}
