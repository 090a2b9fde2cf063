//! Recording I²C bus for driver tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};
use std::vec::Vec;

/// Register-file device at `address`; every other address NAKs.
///
/// A write sets the register pointer from its first byte and stores the
/// rest; a read streams from the pointer. `writes` logs every raw write.
pub struct FakeBus {
    pub address: u8,
    pub regs: [u8; 64],
    pub pointer: usize,
    pub writes: Vec<Vec<u8>>,
    /// Treat writes as a plain byte stream (no register pointer), as a
    /// port expander does.
    pub stream: bool,
    pub fail: bool,
}

impl FakeBus {
    pub fn registers(address: u8) -> Self {
        Self {
            address,
            regs: [0; 64],
            pointer: 0,
            writes: Vec::new(),
            stream: false,
            fail: false,
        }
    }

    pub fn expander(address: u8) -> Self {
        Self {
            stream: true,
            ..Self::registers(address)
        }
    }
}

impl ErrorType for FakeBus {
    type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail || address != self.address {
            return Err(ErrorKind::Other);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    self.writes.push(bytes.to_vec());
                    if self.stream {
                        continue;
                    }
                    if let Some((reg, data)) = bytes.split_first() {
                        self.pointer = *reg as usize;
                        for b in data {
                            self.regs[self.pointer % self.regs.len()] = *b;
                            self.pointer += 1;
                        }
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.regs[self.pointer % self.regs.len()];
                        self.pointer += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delay that returns immediately.
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
