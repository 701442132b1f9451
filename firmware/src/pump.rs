//! Process loop: sleep until woken, then drain everything that is pending.

use bridge_core::link::{GattClient, GattServer, LinkEvent};
use bridge_core::node::Node;
use bridge_core::peripherals::{SensorHardware, StatusDisplay};
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::Instant;

use crate::telemetry::Telemetry;
use crate::wake::LoopEvents;

/// Dispatches pending events until the aggregator reports no work.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub fn drain<H, L, D>(
    node: &mut Node<H, L, D>,
    events: &LoopEvents,
    telemetry: &mut Telemetry,
    now: Instant,
) -> usize
where
    H: SensorHardware,
    L: GattServer + GattClient,
    D: StatusDisplay,
{
    let mut handled = 0;
    while let Some((event, step)) = node.poll(events) {
        telemetry.record_step(event, &step, now);
        handled += 1;
    }
    handled
}

/// Hands one radio-stack signal to the node.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub fn apply_link_event<H, L, D>(
    node: &mut Node<H, L, D>,
    event: LinkEvent,
    telemetry: &mut Telemetry,
) where
    H: SensorHardware,
    L: GattServer + GattClient,
    D: StatusDisplay,
{
    let label = event.label();
    let step = node.on_link_event(event);
    telemetry.record_link(label, &step);
}

/// Runs the node forever.
///
/// Wakes on either an aggregator raise or a link event and drains the
/// aggregator completely before sleeping again.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub async fn serve<H, L, D, M, const N: usize>(
    node: &mut Node<H, L, D>,
    events: &LoopEvents,
    link_events: Receiver<'_, M, LinkEvent, N>,
    telemetry: &mut Telemetry,
    clock: impl Fn() -> Instant,
) -> !
where
    H: SensorHardware,
    L: GattServer + GattClient,
    D: StatusDisplay,
    M: RawMutex,
{
    loop {
        if let Either::Second(event) =
            select(events.wake_signal().wait(), link_events.receive()).await
        {
            apply_link_event(node, event, telemetry);
        }
        drain(node, events, telemetry, clock());
    }
}
