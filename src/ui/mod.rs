//! User interface subsystem - the two display views.
//!
//! Each physical display runs its own render task (see [`render`]). The
//! task reads a [`Snapshot`] of the model, turns it into a [`Frame`] and
//! hands it to a [`Display`], which dispatches to the screen layouts for
//! its panel kind.
//!
//! ## Components
//!
//! - **OLED**: SSD1306 128×64 over I²C, drawn with embedded-graphics
//! - **LCD**: HD44780 16×2 character LCD behind a PCF8574 I²C backpack

pub mod lcd;
pub mod oled;
pub mod render;

use embassy_time::Duration;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::DrawTarget;

use crate::clock::DateTime;
use crate::config::Timing;
use crate::error::Error;
use crate::fsm::FsmState;
use crate::state::Snapshot;
use crate::sync::Flags;
use crate::todo::TodoSummary;

pub use render::{RenderCursor, RenderTask};

/// The displays this firmware knows how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayId {
    Oled,
    Lcd,
}

impl DisplayId {
    pub fn name(&self) -> &'static str {
        match self {
            DisplayId::Oled => "OLED",
            DisplayId::Lcd => "LCD",
        }
    }

    /// Flag set once this display has initialised.
    pub fn ready_flag(&self) -> Flags {
        match self {
            DisplayId::Oled => Flags::OLED_READY,
            DisplayId::Lcd => Flags::LCD_READY,
        }
    }

    /// Flag set once this display's task has exited.
    pub fn stopped_flag(&self) -> Flags {
        match self {
            DisplayId::Oled => Flags::OLED_STOPPED,
            DisplayId::Lcd => Flags::LCD_STOPPED,
        }
    }
}

/// Everything a screen layout may read. Built from one model snapshot, so
/// a frame is never torn across two transitions.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub state: FsmState,
    pub menu: &'a [&'a str],
    pub menu_index: usize,
    pub time: Option<DateTime>,
    pub todo: TodoSummary,
}

impl<'a> Frame<'a> {
    pub fn new(snap: &Snapshot, menu: &'a [&'a str]) -> Self {
        Self {
            state: snap.fsm_state,
            menu,
            menu_index: snap.menu_index,
            time: snap.last_time,
            todo: snap.todo,
        }
    }

    pub fn current_item(&self) -> &'a str {
        self.menu.get(self.menu_index).copied().unwrap_or("Invalid")
    }
}

/// Pixel panel with an off-screen buffer (SSD1306 in buffered mode).
pub trait OledPanel: DrawTarget<Color = BinaryColor> {
    /// Bring the panel up. Called once before the first frame.
    fn init_panel(&mut self) -> Result<(), Error>;

    /// Blank the off-screen buffer.
    fn clear_buffer(&mut self);

    /// Push the buffer to the glass.
    fn flush_buffer(&mut self) -> Result<(), Error>;
}

/// Character panel addressed by row.
pub trait CharPanel {
    fn init_panel(&mut self) -> Result<(), Error>;

    fn clear(&mut self) -> Result<(), Error>;

    /// Write `text` on `row` starting at column 0, padded with spaces to
    /// the full width so the previous contents are overwritten.
    fn write_line(&mut self, row: u8, text: &str) -> Result<(), Error>;

    fn set_backlight(&mut self, on: bool) -> Result<(), Error>;
}

/// A concrete display behind a render task.
pub enum Display<O, L> {
    Oled(O),
    Lcd(L),
}

impl<O: OledPanel, L: CharPanel> Display<O, L> {
    pub fn id(&self) -> DisplayId {
        match self {
            Display::Oled(_) => DisplayId::Oled,
            Display::Lcd(_) => DisplayId::Lcd,
        }
    }

    /// How often this display's task wakes.
    pub fn refresh_period(&self, timing: &Timing) -> Duration {
        match self {
            Display::Oled(_) => timing.oled_refresh,
            Display::Lcd(_) => timing.lcd_refresh,
        }
    }

    /// Whether the screen for `state` shows the clock, so a new time
    /// alone warrants a redraw.
    pub fn shows_time(&self, state: FsmState) -> bool {
        matches!((self, state), (Display::Lcd(_), FsmState::Menu))
    }

    /// Initialise the panel and show its start-up screen.
    pub fn init(&mut self) -> Result<(), Error> {
        match self {
            Display::Oled(panel) => oled::init(panel),
            Display::Lcd(panel) => lcd::init(panel),
        }
    }

    /// Blank the panel.
    pub fn clear(&mut self) -> Result<(), Error> {
        match self {
            Display::Oled(panel) => oled::clear(panel),
            Display::Lcd(panel) => panel.clear(),
        }
    }

    /// Draw the screen for `frame.state`.
    pub fn render(&mut self, frame: &Frame<'_>) -> Result<(), Error> {
        match self {
            Display::Oled(panel) => oled::render(panel, frame),
            Display::Lcd(panel) => lcd::render(panel, frame),
        }
    }
}
