use embassy_time::Instant;

use super::{BoardNode, LinkEventChannel};
use crate::pump;
use crate::telemetry::Telemetry;
use crate::wake::LoopEvents;

#[embassy_executor::task]
pub async fn run(
    node: &'static mut BoardNode,
    events: &'static LoopEvents,
    link_events: &'static LinkEventChannel,
) -> ! {
    let mut telemetry = Telemetry::new();
    pump::serve(node, events, link_events.receiver(), &mut telemetry, Instant::now).await
}
