//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and lock budgets
//! live here so they can be tuned in one place.

use embassy_time::Duration;

// Menu

/// Static menu shown on the `Menu` screen. The order matters: selecting
/// index 0 refreshes the time, 1..=3 enter Settings / About / ConfirmExit.
pub const MENU_ITEMS: [&str; 4] = ["Home", "Settings", "About", "Exit"];

// Sync hub

/// Capacity of the advisory inter-task message queue.
pub const MESSAGE_QUEUE_SIZE: usize = 10;

/// Queue fill level above which the health check warns.
pub const QUEUE_WARN_THRESHOLD: usize = 8;

/// Maximum number of tasks that may wait on the event flags at once.
pub const FLAG_WAITERS: usize = 8;

/// Default bounded wait for queue and flag operations (ms).
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Bounded wait for the console lock (ms).
pub const CONSOLE_LOCK_TIMEOUT_MS: u64 = 100;

/// Bounded wait for the display lock (ms).
pub const DISPLAY_LOCK_TIMEOUT_MS: u64 = 100;

// Shared state lock budgets (ms)

/// Plain reads (menu index, FSM state, snapshot).
pub const STATE_READ_TIMEOUT_MS: u64 = 10;

/// Reading the `changed` flag.
pub const CHANGED_READ_TIMEOUT_MS: u64 = 20;

/// Writes (index, state, time, task list).
pub const STATE_WRITE_TIMEOUT_MS: u64 = 100;

// Task cadence

/// Button polling period (ms).
pub const INPUT_POLL_MS: u64 = 10;

/// Button debounce window (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

/// OLED refresh period (ms).
pub const OLED_REFRESH_MS: u64 = 250;

/// Character LCD refresh period (ms).
pub const LCD_REFRESH_MS: u64 = 500;

/// RTC mirror refresh period (ms).
pub const CLOCK_REFRESH_MS: u64 = 1000;

/// How long start-up waits for every task to report ready (ms).
pub const STARTUP_READY_TIMEOUT_MS: u64 = 5000;

/// Health check period (ms).
pub const HEALTH_CHECK_MS: u64 = 10_000;

/// Uptime / headroom report period (seconds).
pub const STATUS_REPORT_SECS: u64 = 30;

/// How long teardown waits for each task to acknowledge stop (ms).
pub const TEARDOWN_ACK_TIMEOUT_MS: u64 = 1000;

/// Remaining stack below which the health check warns (bytes).
pub const STACK_HEADROOM_WARN_BYTES: usize = 512;

// Task priorities (NVIC levels, lower number = more urgent)
//
//   input    → EGU1_SWI1 interrupt executor, P6
//   displays → EGU0_SWI0 interrupt executor, P7
//   clock / health / supervisor → thread-mode executor

pub const INPUT_TASK_PRIORITY: u8 = 6;
pub const RENDER_TASK_PRIORITY: u8 = 7;

// GPIO pin assignments (nRF52840-DK defaults)
//
//   Button UP       → P0.11
//   Button DOWN     → P0.12
//   Button LEFT     → P0.24
//   Button RIGHT    → P0.25
//   Button SELECT1  → P0.03
//   Button SELECT2  → P0.04
//   I²C SDA         → P0.26
//   I²C SCL         → P0.27

/// SSD1306 OLED I²C address.
pub const OLED_I2C_ADDR: u8 = 0x3C;

/// PCF8574 LCD backpack I²C address.
pub const LCD_I2C_ADDR: u8 = 0x27;

/// DS1307 RTC I²C address.
pub const RTC_I2C_ADDR: u8 = 0x68;

/// Character LCD geometry.
pub const LCD_COLS: usize = 16;
pub const LCD_ROWS: usize = 2;

/// Runtime timing knobs handed to every task.
///
/// `Default` reproduces the constants above; tests shrink them.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    pub input_poll: Duration,
    pub debounce: Duration,
    pub oled_refresh: Duration,
    pub lcd_refresh: Duration,
    pub clock_refresh: Duration,
    pub display_lock: Duration,
    pub ready_timeout: Duration,
    pub health_period: Duration,
    pub status_report: Duration,
    pub teardown_ack: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            input_poll: Duration::from_millis(INPUT_POLL_MS),
            debounce: Duration::from_millis(BUTTON_DEBOUNCE_MS),
            oled_refresh: Duration::from_millis(OLED_REFRESH_MS),
            lcd_refresh: Duration::from_millis(LCD_REFRESH_MS),
            clock_refresh: Duration::from_millis(CLOCK_REFRESH_MS),
            display_lock: Duration::from_millis(DISPLAY_LOCK_TIMEOUT_MS),
            ready_timeout: Duration::from_millis(STARTUP_READY_TIMEOUT_MS),
            health_period: Duration::from_millis(HEALTH_CHECK_MS),
            status_report: Duration::from_secs(STATUS_REPORT_SECS),
            teardown_ack: Duration::from_millis(TEARDOWN_ACK_TIMEOUT_MS),
        }
    }
}

/// Lock budgets used by `AppState`.
#[derive(Clone, Copy, Debug)]
pub struct StateTimeouts {
    pub read: Duration,
    pub changed: Duration,
    pub write: Duration,
}

impl Default for StateTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_millis(STATE_READ_TIMEOUT_MS),
            changed: Duration::from_millis(CHANGED_READ_TIMEOUT_MS),
            write: Duration::from_millis(STATE_WRITE_TIMEOUT_MS),
        }
    }
}
