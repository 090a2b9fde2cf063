//! `OledPanel` for the SSD1306 in buffered-graphics mode.

use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};

use crate::config::OLED_I2C_ADDR;
use crate::error::Error;
use crate::ui::{DisplayId, OledPanel};

/// Type alias for the concrete display driver.
///
/// Generic over the I²C implementation so callers pass in their HAL's
/// I²C peripheral (or a shared-bus device).
pub type Oled<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// Wrap the bus in a 128×64 driver. Nothing is sent until `init_panel`.
pub fn oled<I2C>(i2c: I2C) -> Oled<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    let interface = I2CDisplayInterface::new_custom_address(i2c, OLED_I2C_ADDR);
    Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode()
}

impl<DI, SIZE> OledPanel for Ssd1306<DI, SIZE, BufferedGraphicsMode<SIZE>>
where
    DI: WriteOnlyDataCommand,
    SIZE: DisplaySize,
{
    fn init_panel(&mut self) -> Result<(), Error> {
        DisplayConfig::init(self).map_err(|_| Error::Display(DisplayId::Oled))
    }

    fn clear_buffer(&mut self) {
        Ssd1306::clear_buffer(self);
    }

    fn flush_buffer(&mut self) -> Result<(), Error> {
        self.flush().map_err(|_| Error::Display(DisplayId::Oled))
    }
}
