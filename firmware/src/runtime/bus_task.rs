use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;

use crate::hw::{BusRequest, SensorRequests};
use crate::wake::LoopEvents;

/// Performs sensor transfers and reports their completion.
///
/// A failed transfer still completes so the acquisition sequence returns to
/// idle; a failed read leaves the previous raw code in place.
#[embassy_executor::task]
pub async fn run(
    mut bus: I2c<'static, Blocking>,
    requests: &'static SensorRequests,
    events: &'static LoopEvents,
) -> ! {
    loop {
        let request = requests.next_bus().await;
        let read = match request {
            BusRequest::Write { address, command } => {
                if bus.blocking_write(address, &[command]).is_err() {
                    defmt::warn!("bus: write to {=u8:#x} failed", address);
                }
                None
            }
            BusRequest::Read { address } => {
                let mut buffer = [0u8; 2];
                match bus.blocking_read(address, &mut buffer) {
                    Ok(()) => Some(u16::from_be_bytes(buffer)),
                    Err(_) => {
                        defmt::warn!("bus: read from {=u8:#x} failed", address);
                        None
                    }
                }
            }
        };

        if !requests.complete_bus(events, read) {
            defmt::debug!("bus: completion masked for {}", request);
        }
    }
}
