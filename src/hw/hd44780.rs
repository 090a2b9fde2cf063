//! HD44780 character LCD behind a PCF8574 I²C backpack, 4-bit mode.
//!
//! Expander bits: P0 = RS, P1 = RW, P2 = EN, P3 = backlight,
//! P4..P7 = D4..D7.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::{LCD_COLS, LCD_I2C_ADDR, LCD_ROWS};
use crate::error::Error;
use crate::ui::{CharPanel, DisplayId};

const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

const CMD_CLEAR: u8 = 0x01;
const CMD_HOME: u8 = 0x02;
const CMD_ENTRY_LEFT: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

pub struct Hd44780<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    backlight: u8,
}

impl<I2C: I2c, D: DelayNs> Hd44780<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            address: LCD_I2C_ADDR,
            backlight: BACKLIGHT,
        }
    }

    fn expander(&mut self, bits: u8) -> Result<(), Error> {
        self.i2c
            .write(self.address, &[bits | self.backlight])
            .map_err(|_| Error::Bus)
    }

    fn pulse(&mut self, bits: u8) -> Result<(), Error> {
        self.expander(bits | EN)?;
        self.delay.delay_us(1);
        self.expander(bits & !EN)?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn write4(&mut self, nibble: u8, mode: u8) -> Result<(), Error> {
        let bits = (nibble << 4) | mode;
        self.expander(bits)?;
        self.pulse(bits)
    }

    fn send(&mut self, byte: u8, mode: u8) -> Result<(), Error> {
        self.write4(byte >> 4, mode)?;
        self.write4(byte & 0x0F, mode)
    }

    fn command(&mut self, cmd: u8) -> Result<(), Error> {
        self.send(cmd, 0)
    }

    fn data(&mut self, byte: u8) -> Result<(), Error> {
        self.send(byte, RS)
    }

    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), Error> {
        if row as usize >= LCD_ROWS {
            return Err(Error::Display(DisplayId::Lcd));
        }
        self.command(CMD_SET_DDRAM | (col + ROW_OFFSETS[row as usize]))
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c, D: DelayNs> CharPanel for Hd44780<I2C, D> {
    /// Power-on sequence for 4-bit mode: three 8-bit function sets, then
    /// switch to 4-bit and configure.
    fn init_panel(&mut self) -> Result<(), Error> {
        self.delay.delay_ms(50);
        self.expander(0)?;
        self.delay.delay_ms(10);

        self.write4(0x03, 0)?;
        self.delay.delay_us(4500);
        self.write4(0x03, 0)?;
        self.delay.delay_us(4500);
        self.write4(0x03, 0)?;
        self.delay.delay_us(150);
        self.write4(0x02, 0)?;

        self.command(CMD_FUNCTION_4BIT_2LINE)?;
        self.command(CMD_DISPLAY_ON)?;
        self.clear()?;
        self.command(CMD_ENTRY_LEFT)?;
        self.command(CMD_HOME)?;
        self.delay.delay_ms(2);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.command(CMD_CLEAR)?;
        self.delay.delay_ms(2);
        Ok(())
    }

    fn write_line(&mut self, row: u8, text: &str) -> Result<(), Error> {
        self.set_cursor(0, row)?;
        let mut chars = text.chars();
        for _ in 0..LCD_COLS {
            let byte = match chars.next() {
                Some(c) if c.is_ascii() => c as u8,
                Some(_) => b'?',
                None => b' ',
            };
            self.data(byte)?;
        }
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), Error> {
        self.backlight = if on { BACKLIGHT } else { 0 };
        self.expander(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::fake::{FakeBus, NoDelay};
    use std::vec::Vec;

    /// Rebuild (rs, byte) pairs from the strobed nibbles in a write log.
    fn decode(writes: &[Vec<u8>]) -> Vec<(bool, u8)> {
        let nibbles: Vec<(bool, u8)> = writes
            .iter()
            .map(|w| w[0])
            .filter(|b| b & EN != 0)
            .map(|b| (b & RS != 0, b >> 4))
            .collect();
        nibbles
            .chunks(2)
            .map(|pair| (pair[0].0, (pair[0].1 << 4) | pair[1].1))
            .collect()
    }

    #[test]
    fn write_line_positions_and_pads() {
        let mut bus = FakeBus::expander(LCD_I2C_ADDR);
        let mut lcd = Hd44780::new(&mut bus, NoDelay);
        lcd.write_line(1, "Hi").unwrap();
        drop(lcd);

        let sent = decode(&bus.writes);
        assert_eq!(sent[0], (false, CMD_SET_DDRAM | 0x40));
        assert!(sent[1..].iter().all(|(rs, _)| *rs));
        let text: Vec<u8> = sent[1..].iter().map(|(_, b)| *b).collect();
        assert_eq!(text.len(), LCD_COLS);
        assert_eq!(&text[..4], b"Hi  ");
    }

    #[test]
    fn init_ends_in_4bit_two_line_mode() {
        let mut bus = FakeBus::expander(LCD_I2C_ADDR);
        let mut lcd = Hd44780::new(&mut bus, NoDelay);
        lcd.init_panel().unwrap();
        drop(lcd);

        // One idle write, then four single nibbles of three writes each.
        let nibbles: Vec<u8> = bus.writes[1..13]
            .iter()
            .map(|w| w[0])
            .filter(|b| b & EN != 0)
            .map(|b| b >> 4)
            .collect();
        assert_eq!(nibbles, [3, 3, 3, 2]);

        let cmds = decode(&bus.writes[13..]);
        assert_eq!(cmds[0], (false, CMD_FUNCTION_4BIT_2LINE));
        assert_eq!(cmds[1], (false, CMD_DISPLAY_ON));
        assert!(cmds.contains(&(false, CMD_CLEAR)));
    }

    #[test]
    fn backlight_bit_follows_setting() {
        let mut bus = FakeBus::expander(LCD_I2C_ADDR);
        let mut lcd = Hd44780::new(&mut bus, NoDelay);
        lcd.set_backlight(false).unwrap();
        lcd.set_backlight(true).unwrap();
        drop(lcd);
        assert_eq!(bus.writes, [std::vec![0], std::vec![BACKLIGHT]]);
    }

    #[test]
    fn bus_errors_and_bad_rows_are_reported() {
        let mut bus = FakeBus::expander(LCD_I2C_ADDR);
        bus.fail = true;
        let mut lcd = Hd44780::new(&mut bus, NoDelay);
        assert_eq!(lcd.clear(), Err(Error::Bus));
        assert_eq!(
            lcd.write_line(2, "x"),
            Err(Error::Display(DisplayId::Lcd))
        );
    }
}
