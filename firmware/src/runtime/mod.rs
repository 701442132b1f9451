use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::i2c::{Config as I2cConfig, I2c};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Duration;
use static_cell::StaticCell;

use bridge_core::link::{DetachedLink, LinkEvent};
use bridge_core::node::{Node, NodeRole};

use crate::hw::power::GpioSensorPower;
use crate::hw::{BoardHardware, SensorRequests};
use crate::telemetry::LogDisplay;
use crate::wake::{LoopEvents, LoopWake};

mod bus_task;
mod delay_task;
mod node_task;
mod ticker_task;

/// Interval between measurements (timer underflow period).
pub const MEASUREMENT_PERIOD: Duration = Duration::from_secs(3);

/// Link events buffered between the radio stack and the process loop.
pub const LINK_EVENT_DEPTH: usize = 8;

pub type LinkEventChannel = Channel<CriticalSectionRawMutex, LinkEvent, LINK_EVENT_DEPTH>;

pub type BoardNode =
    Node<BoardHardware<'static, GpioSensorPower<'static>>, DetachedLink, LogDisplay>;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static EVENTS: LoopEvents = LoopEvents::new(LoopWake::new());
pub(super) static REQUESTS: SensorRequests = SensorRequests::new();
pub(super) static LINK_EVENTS: LinkEventChannel = Channel::new();
static NODE: StaticCell<BoardNode> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        I2C1, PB8, PB9, PA8, ..
    } = hal::init(config);

    let bus = I2c::new_blocking(I2C1, PB8, PB9, I2cConfig::default());
    let power = GpioSensorPower::new(Output::new(PA8, Level::Low, Speed::Low));

    let node = NODE.init(Node::new(
        NodeRole::Server,
        BoardHardware::new(&REQUESTS, power),
        DetachedLink::new(),
        LogDisplay::new(),
    ));
    node.start();
    defmt::info!("runtime: sensor bridge started, period={}ms", MEASUREMENT_PERIOD.as_millis());

    spawner
        .spawn(delay_task::run(&REQUESTS, &EVENTS))
        .expect("failed to spawn delay task");

    spawner
        .spawn(bus_task::run(bus, &REQUESTS, &EVENTS))
        .expect("failed to spawn bus task");

    spawner
        .spawn(node_task::run(node, &EVENTS, &LINK_EVENTS))
        .expect("failed to spawn node task");

    spawner
        .spawn(ticker_task::run(&EVENTS))
        .expect("failed to spawn ticker task");

    core::future::pending::<()>().await;
}
