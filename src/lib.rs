//! Menu controller for a two-display front panel.
//!
//! Six buttons drive a small state machine (menu, settings, about, exit
//! confirmation). Two displays show the same model at their own cadence:
//! a 128x64 SSD1306 OLED and a 16x2 HD44780 character LCD. A DS1307 RTC
//! feeds the clock line on the LCD.
//!
//! Everything here is `no_std` and runs unchanged on the host for tests:
//! tasks are plain `async fn`s over an explicitly constructed [`SyncHub`]
//! and [`AppState`], and hardware sits behind small traits
//! ([`input::InputLines`], [`ui::OledPanel`], [`ui::CharPanel`],
//! [`clock::Clock`]).
//!
//! Usage: `cargo test` on the host, `cargo run --release --features embedded`
//! for the nRF52840 firmware in `main.rs`.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod clock;
pub mod config;
pub mod error;
pub mod fsm;
pub mod hw;
pub mod input;
pub mod state;
pub mod supervisor;
pub mod sync;
pub mod todo;
pub mod ui;

pub use config::Timing;
pub use error::{Component, Error};
pub use fsm::{Action, Event, FsmState};
pub use state::{AppState, Outcome, Snapshot};
pub use sync::{Flags, SyncHub, SystemMessage};
