use embassy_time::Timer;

use crate::hw::SensorRequests;
use crate::wake::LoopEvents;

/// One-shot compare timer for the power-on and conversion delays.
#[embassy_executor::task]
pub async fn run(requests: &'static SensorRequests, events: &'static LoopEvents) -> ! {
    loop {
        let delay = requests.next_delay().await;
        Timer::after(delay).await;
        requests.complete_delay(events);
    }
}
