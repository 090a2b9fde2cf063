//! Peripheral drivers behind the display and clock traits.
//!
//! All of them are blocking `embedded-hal` 1.0 I²C users, so they can share
//! one bus through a critical-section device.

pub mod ds1307;
pub mod hd44780;
#[cfg(feature = "embedded")]
pub mod ssd1306_panel;

#[cfg(test)]
pub(crate) mod fake;

pub use ds1307::Ds1307;
pub use hd44780::Hd44780;
