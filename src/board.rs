//! nRF52840 board glue: button pins and the painted-stack probe.

use embassy_nrf::gpio::{Input, Pull};
use embassy_nrf::interrupt::Priority;
use embassy_nrf::peripherals::{P0_03, P0_04, P0_11, P0_12, P0_24, P0_25};
use panelmenu::input::BUTTON_COUNT;
use panelmenu::supervisor::{untouched_bytes, HeadroomProbe, STACK_PAINT};

/// The six buttons, active-low with internal pull-up, in `Button::ALL`
/// order.
pub type Buttons = [Input<'static>; BUTTON_COUNT];

pub fn buttons(
    up: P0_11,
    down: P0_12,
    left: P0_24,
    right: P0_25,
    select1: P0_03,
    select2: P0_04,
) -> Buttons {
    [
        Input::new(up, Pull::Up),
        Input::new(down, Pull::Up),
        Input::new(left, Pull::Up),
        Input::new(right, Pull::Up),
        Input::new(select1, Pull::Up),
        Input::new(select2, Pull::Up),
    ]
}

/// NVIC level from a `config` priority number. Out-of-range numbers get
/// the least urgent level.
pub fn nvic_priority(level: u8) -> Priority {
    match level {
        0 => Priority::P0,
        1 => Priority::P1,
        2 => Priority::P2,
        3 => Priority::P3,
        4 => Priority::P4,
        5 => Priority::P5,
        6 => Priority::P6,
        _ => Priority::P7,
    }
}

extern "C" {
    // End of .bss/.data, start of free RAM (cortex-m-rt linker script).
    static __sheap: u32;
}

/// Stays clear of the frame that is doing the painting.
const PAINT_MARGIN_WORDS: usize = 64;

/// Painted span between the end of static RAM and the boot-time stack
/// pointer.
#[derive(Clone, Copy)]
pub struct StackProbe {
    bottom: usize,
    words: usize,
}

impl StackProbe {
    /// Fill unused stack with [`STACK_PAINT`]. Call once, first thing in
    /// `main`, before any deep call chain has run.
    pub fn paint() -> Self {
        let bottom = unsafe { core::ptr::addr_of!(__sheap) } as usize;
        let top = cortex_m::register::msp::read() as usize;
        let words = (top.saturating_sub(bottom) / core::mem::size_of::<u32>())
            .saturating_sub(PAINT_MARGIN_WORDS);

        let base = bottom as *mut u32;
        for i in 0..words {
            // SAFETY: [bottom, top - margin) is unused stack below the
            // current frame; nothing else lives there yet.
            unsafe { core::ptr::write_volatile(base.add(i), STACK_PAINT) };
        }
        Self { bottom, words }
    }
}

impl HeadroomProbe for StackProbe {
    fn headroom(&self) -> Option<usize> {
        if self.words == 0 {
            return None;
        }
        // SAFETY: the region was painted by `paint` and is only ever read
        // here; a concurrent push may change a word, which only makes the
        // count smaller.
        let region = unsafe { core::slice::from_raw_parts(self.bottom as *const u32, self.words) };
        Some(untouched_bytes(region))
    }
}
