//! DS1307 real-time clock over I²C.
//!
//! Seven BCD time registers starting at 0x00. Bit 7 of the seconds
//! register is the clock-halt flag; bit 6 of the hours register selects
//! 12-hour mode.

use embedded_hal::i2c::I2c;

use crate::clock::{Clock, DateTime};
use crate::config::RTC_I2C_ADDR;
use crate::error::Error;

const REG_SECONDS: u8 = 0x00;
const CLOCK_HALT: u8 = 0x80;
const HOUR_12H: u8 = 0x40;
const HOUR_PM: u8 = 0x20;

fn from_bcd(v: u8) -> u8 {
    (v >> 4) * 10 + (v & 0x0F)
}

fn to_bcd(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

fn decode_hour(reg: u8) -> u8 {
    if reg & HOUR_12H == 0 {
        return from_bcd(reg & 0x3F);
    }
    let h = from_bcd(reg & 0x1F) % 12;
    if reg & HOUR_PM != 0 {
        h + 12
    } else {
        h
    }
}

/// Decode the seven time registers.
pub fn decode(regs: &[u8; 7]) -> DateTime {
    DateTime {
        second: from_bcd(regs[0] & !CLOCK_HALT),
        minute: from_bcd(regs[1] & 0x7F),
        hour: decode_hour(regs[2]),
        // regs[3] is day-of-week, not shown.
        day: from_bcd(regs[4] & 0x3F),
        month: from_bcd(regs[5] & 0x1F),
        year: 2000 + from_bcd(regs[6]) as u16,
    }
}

/// Encode in 24-hour mode with the oscillator running.
pub fn encode(t: &DateTime) -> [u8; 7] {
    [
        to_bcd(t.second),
        to_bcd(t.minute),
        to_bcd(t.hour),
        1,
        to_bcd(t.day),
        to_bcd(t.month),
        to_bcd((t.year.saturating_sub(2000) % 100) as u8),
    ]
}

pub struct Ds1307<I2C> {
    i2c: I2C,
    address: u8,
    present: bool,
}

impl<I2C: I2c> Ds1307<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            address: RTC_I2C_ADDR,
            present: false,
        }
    }

    /// Check the chip answers. Call once at start-up; a missing RTC makes
    /// [`Clock::available`] report `false` for the rest of the run.
    pub fn probe(&mut self) -> bool {
        let mut buf = [0u8; 1];
        self.present = self
            .i2c
            .write_read(self.address, &[REG_SECONDS], &mut buf)
            .is_ok();
        if !self.present {
            warn!("Couldn't find RTC");
        }
        self.present
    }

    /// `true` when the oscillator is stopped (fresh battery, never set).
    pub fn is_halted(&mut self) -> Result<bool, Error> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[REG_SECONDS], &mut buf)
            .map_err(|_| Error::Clock)?;
        Ok(buf[0] & CLOCK_HALT != 0)
    }

    pub fn read(&mut self) -> Result<DateTime, Error> {
        let mut regs = [0u8; 7];
        self.i2c
            .write_read(self.address, &[REG_SECONDS], &mut regs)
            .map_err(|_| Error::Clock)?;
        Ok(decode(&regs))
    }

    /// Set the time and start the oscillator.
    pub fn set(&mut self, t: &DateTime) -> Result<(), Error> {
        let regs = encode(t);
        let mut buf = [0u8; 8];
        buf[0] = REG_SECONDS;
        buf[1..].copy_from_slice(&regs);
        self.i2c.write(self.address, &buf).map_err(|_| Error::Clock)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> Clock for Ds1307<I2C> {
    fn available(&self) -> bool {
        self.present
    }

    fn now(&mut self) -> Option<DateTime> {
        if !self.present {
            return None;
        }
        self.read().ok().filter(DateTime::is_valid)
    }
}
