//! panelmenu firmware - nRF52840 front panel with OLED + character LCD.
//!
//! Brings up the shared I²C bus, both displays, the RTC and six buttons,
//! then spreads the tasks over three executors:
//!
//!   EGU1_SWI1 (P6)  input controller
//!   EGU0_SWI0 (P7)  OLED and LCD render tasks
//!   thread mode     clock, event log, start-up supervisor, then the
//!                   health monitor once the system is operational

#![no_std]
#![no_main]

mod board;

use core::cell::RefCell;

use defmt::{error, info, unwrap};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_nrf::interrupt;
use embassy_nrf::interrupt::InterruptExt;
use embassy_nrf::peripherals::TWISPI0;
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::bind_interrupts;
use embassy_time::{Delay, Duration};
use embedded_hal_bus::i2c::CriticalSectionDevice;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use panelmenu::clock::run_clock;
use panelmenu::config::{Timing, INPUT_TASK_PRIORITY, MENU_ITEMS, RENDER_TASK_PRIORITY};
use panelmenu::hw::ssd1306_panel::{oled, Oled};
use panelmenu::hw::{Ds1307, Hd44780};
use panelmenu::input::InputProcessor;
use panelmenu::supervisor::{run_event_log, startup, HealthMonitor};
use panelmenu::ui::{Display, RenderTask};
use panelmenu::{AppState, Component, Error, SyncHub};

use board::{Buttons, StackProbe};

type BusDevice = Twim<'static, TWISPI0>;
type Bus = CriticalSectionDevice<'static, BusDevice>;
type Lcd = Hd44780<Bus, Delay>;
type PanelDisplay = Display<Oled<Bus>, Lcd>;

bind_interrupts!(struct Irqs {
    TWISPI0 => twim::InterruptHandler<TWISPI0>;
});

static EXECUTOR_INPUT: InterruptExecutor = InterruptExecutor::new();
static EXECUTOR_RENDER: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn EGU1_SWI1() {
    EXECUTOR_INPUT.on_interrupt()
}

#[interrupt]
unsafe fn EGU0_SWI0() {
    EXECUTOR_RENDER.on_interrupt()
}

static HUB: SyncHub = SyncHub::new();
static STATE: StaticCell<AppState<'static>> = StaticCell::new();
static I2C_BUS: StaticCell<critical_section::Mutex<RefCell<BusDevice>>> = StaticCell::new();

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task]
async fn input_task(controller: InputProcessor<'static, Buttons>) {
    controller.run().await
}

#[embassy_executor::task(pool_size = 2)]
async fn render_task(task: RenderTask<'static, Oled<Bus>, Lcd>) {
    task.run().await
}

#[embassy_executor::task]
async fn clock_task(state: &'static AppState<'static>, rtc: Ds1307<Bus>, period: Duration) {
    run_clock(&HUB, state, rtc, period).await
}

#[embassy_executor::task]
async fn event_log_task() {
    run_event_log(&HUB).await
}

#[embassy_executor::task]
async fn health_task(monitor: HealthMonitor<'static, StackProbe>) {
    let report = monitor.run().await;
    if report.is_clean() {
        info!("All tasks stopped");
    } else {
        error!("Tasks did not acknowledge stop: {:?}", report.missing);
    }
}

/// Stop making progress but keep RTT and the other executors alive.
async fn park() {
    core::future::pending::<()>().await
}

// ═══════════════════════════════════════════════════════════════════════════
// Entry point
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let probe = StackProbe::paint();
    let p = embassy_nrf::init(Default::default());
    let timing = Timing::default();

    info!("panelmenu v{} starting", env!("CARGO_PKG_VERSION"));

    // --- Shared I²C bus ---------------------------------------------------
    let mut i2c_config = twim::Config::default();
    i2c_config.frequency = twim::Frequency::K400;
    let twim = Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, i2c_config);
    let bus = I2C_BUS.init(critical_section::Mutex::new(RefCell::new(twim)));

    // --- Model ------------------------------------------------------------
    let state = match AppState::new(&HUB, &MENU_ITEMS) {
        Ok(state) => STATE.init(state),
        Err(e) => {
            error!("{}: {}", Error::InitFailed(Component::State), e);
            return park().await;
        }
    };

    // --- Collaborators ----------------------------------------------------
    let mut rtc = Ds1307::new(CriticalSectionDevice::new(bus));
    let _ = rtc.probe();
    let oled_display: PanelDisplay = Display::Oled(oled(CriticalSectionDevice::new(bus)));
    let lcd_display: PanelDisplay = Display::Lcd(Hd44780::new(CriticalSectionDevice::new(bus), Delay));
    let buttons = board::buttons(p.P0_11, p.P0_12, p.P0_24, p.P0_25, p.P0_03, p.P0_04);

    // --- Executors --------------------------------------------------------
    interrupt::EGU1_SWI1.set_priority(board::nvic_priority(INPUT_TASK_PRIORITY));
    let input_spawner = EXECUTOR_INPUT.start(interrupt::EGU1_SWI1);
    interrupt::EGU0_SWI0.set_priority(board::nvic_priority(RENDER_TASK_PRIORITY));
    let render_spawner = EXECUTOR_RENDER.start(interrupt::EGU0_SWI0);

    unwrap!(input_spawner.spawn(input_task(InputProcessor::new(&HUB, state, buttons, &timing))));
    unwrap!(render_spawner.spawn(render_task(RenderTask::new(&HUB, state, oled_display, &timing))));
    unwrap!(render_spawner.spawn(render_task(RenderTask::new(&HUB, state, lcd_display, &timing))));
    unwrap!(spawner.spawn(clock_task(state, rtc, timing.clock_refresh)));
    unwrap!(spawner.spawn(event_log_task()));

    // --- Start-up handshake -----------------------------------------------
    // On timeout every task that did start is stopped before we park.
    if let Err(e) = startup(&HUB, state, &timing).await {
        error!("Start-up failed: {}", e);
        return park().await;
    }
    unwrap!(spawner.spawn(health_task(HealthMonitor::new(&HUB, state, probe, &timing))));
    info!("System operational");
}
