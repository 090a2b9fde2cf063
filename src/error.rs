//! Unified error type for panelmenu.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.
//!
//! Only start-up failures are errors in the user-visible sense. Lock
//! contention, out-of-range input and a missing clock are handled by the
//! callers (see `state::Outcome`) and never become an `Error`.

use core::fmt;

use crate::sync::Flags;
use crate::ui::DisplayId;

/// Subsystems that must come up before the system is operational.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Component {
    State,
    Display(DisplayId),
}

/// Top-level error type used across the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A collaborator or primitive failed to initialise.
    InitFailed(Component),

    /// Not every task reported ready within the start-up window.
    StartupTimeout {
        /// Readiness bits that never arrived.
        missing: Flags,
    },

    /// A draw or flush on the given display failed.
    Display(DisplayId),

    /// The RTC could not be read.
    Clock,

    /// I²C transaction failed.
    Bus,

    /// The menu item list was empty.
    EmptyMenu,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::State => f.write_str("app state"),
            Component::Display(id) => write!(f, "{} display", id.name()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InitFailed(c) => write!(f, "{} failed to initialise", c),
            Error::StartupTimeout { missing } => {
                write!(f, "startup timed out waiting for {:#04x}", missing.bits())
            }
            Error::Display(id) => write!(f, "{} display write failed", id.name()),
            Error::Clock => f.write_str("clock read failed"),
            Error::Bus => f.write_str("i2c transaction failed"),
            Error::EmptyMenu => f.write_str("menu has no items"),
        }
    }
}
