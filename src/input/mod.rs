//! Button input: six active-low lines, polled and debounced by the
//! controller task.
//!
//! ## Lines (priority order)
//!
//! - **UP / DOWN**: move the menu cursor
//! - **LEFT**: back
//! - **RIGHT**: reserved
//! - **SELECT1**: choose / confirm
//! - **SELECT2**: back / cancel

pub mod controller;
pub mod debounce;

use embedded_hal::digital::InputPin;

use crate::fsm::Event;

pub use controller::InputProcessor;
pub use debounce::{ButtonState, Debouncer};

/// Number of logical input lines.
pub const BUTTON_COUNT: usize = 6;

/// Logical buttons, in the order they are scanned each poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Select1,
    Select2,
}

impl Button {
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Select1,
        Button::Select2,
    ];

    /// FSM event raised by a press.
    pub fn event(&self) -> Event {
        match self {
            Button::Up => Event::Up,
            Button::Down => Event::Down,
            Button::Left => Event::Left,
            Button::Right => Event::Right,
            Button::Select1 => Event::Select1,
            Button::Select2 => Event::Select2,
        }
    }
}

/// Electrical level of a line. Buttons pull low when pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    High,
    Low,
}

impl Level {
    pub fn is_active(&self) -> bool {
        matches!(self, Level::Low)
    }
}

/// Source of raw line levels, indexed like [`Button::ALL`].
pub trait InputLines {
    fn levels(&mut self) -> [Level; BUTTON_COUNT];
}

/// Six GPIO inputs in [`Button::ALL`] order. A failed read counts as
/// released.
impl<P: InputPin> InputLines for [P; BUTTON_COUNT] {
    fn levels(&mut self) -> [Level; BUTTON_COUNT] {
        core::array::from_fn(|i| match self[i].is_low() {
            Ok(true) => Level::Low,
            _ => Level::High,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    struct Pin(bool);

    impl ErrorType for Pin {
        type Error = Infallible;
    }

    impl InputPin for Pin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0)
        }
    }

    #[test]
    fn pin_array_reports_levels_in_order() {
        let mut pins = [
            Pin(false),
            Pin(true),
            Pin(false),
            Pin(false),
            Pin(false),
            Pin(true),
        ];
        let levels = pins.levels();
        assert_eq!(levels[1], Level::Low);
        assert_eq!(levels[5], Level::Low);
        assert_eq!(levels.iter().filter(|l| l.is_active()).count(), 2);
    }

    #[test]
    fn buttons_map_to_events() {
        let events: [Event; BUTTON_COUNT] = Button::ALL.map(|b| b.event());
        assert_eq!(
            events,
            [
                Event::Up,
                Event::Down,
                Event::Left,
                Event::Right,
                Event::Select1,
                Event::Select2
            ]
        );
    }
}
