// Licensed under the Apache-2.0 license

//! ATmega328P TWI register block.
//!
//! Each command is a single volatile write of TWCR. Writing TWINT as one
//! clears the interrupt flag and starts the next bus action; TWEN and TWIE
//! are repeated on every write so each command re-enables the interrupt.
//!
//! The TWI interrupt is level-triggered: it keeps firing for as long as TWINT
//! and TWIE are both set. The handler therefore clears TWIE once it has
//! recorded the status, so every bus event is recorded exactly once.

use core::ptr::{read_volatile, write_volatile};

use crate::i2c::status::{StatusLatch, TWI_STATUS};
use crate::i2c::traits::TwiHardware;

const TWCR_TWINT: u8 = 1 << 7;
const TWCR_TWEA: u8 = 1 << 6;
const TWCR_TWSTA: u8 = 1 << 5;
const TWCR_TWSTO: u8 = 1 << 4;
const TWCR_TWEN: u8 = 1 << 2;
const TWCR_TWIE: u8 = 1 << 0;
const TWSR_TWPS_MASK: u8 = 0x03;

/// Data-space addresses of the TWI registers.
#[derive(Copy, Clone, Debug)]
pub struct TwiRegisterMap {
    pub twbr: usize,
    pub twsr: usize,
    pub twdr: usize,
    pub twcr: usize,
}

pub const ATMEGA328P_TWI: TwiRegisterMap = TwiRegisterMap {
    twbr: 0xb8,
    twsr: 0xb9,
    twdr: 0xbb,
    twcr: 0xbc,
};

pub struct Atmega328pTwi {
    map: TwiRegisterMap,
}

impl Atmega328pTwi {
    /// # Safety
    ///
    /// Every address in `map` must be valid for volatile byte reads and
    /// writes for as long as the block is used, and nothing else may drive
    /// the same TWI module.
    #[must_use]
    pub const unsafe fn new(map: TwiRegisterMap) -> Self {
        Self { map }
    }

    /// Register block of the on-chip TWI.
    ///
    /// # Safety
    ///
    /// Must only be called on an ATmega328P, and only once outside the TWI
    /// vector.
    #[must_use]
    pub const unsafe fn take() -> Self {
        Self::new(ATMEGA328P_TWI)
    }

    fn read(&self, addr: usize) -> u8 {
        // SAFETY: `new` requires every mapped address to be valid.
        unsafe { read_volatile(addr as *const u8) }
    }

    fn write(&mut self, addr: usize, value: u8) {
        // SAFETY: `new` requires every mapped address to be valid.
        unsafe { write_volatile(addr as *mut u8, value) }
    }

    fn command(&mut self, bits: u8) {
        self.write(self.map.twcr, bits | TWCR_TWINT | TWCR_TWEN | TWCR_TWIE);
    }
}

impl TwiHardware for Atmega328pTwi {
    fn enable(&mut self) {
        self.write(self.map.twcr, TWCR_TWEN | TWCR_TWIE);
    }

    fn set_divisor(&mut self, divisor: u8) {
        self.write(self.map.twbr, divisor);
        let twsr = self.read(self.map.twsr);
        self.write(self.map.twsr, twsr & !TWSR_TWPS_MASK);
    }

    fn begin(&mut self) {
        self.command(TWCR_TWSTA);
    }

    fn end(&mut self) {
        self.command(TWCR_TWSTO);
    }

    fn transmit(&mut self, byte: u8) {
        self.write(self.map.twdr, byte);
        self.command(0);
    }

    fn receive(&mut self, ack: bool) {
        self.command(if ack { TWCR_TWEA } else { 0 });
    }

    fn disarm(&mut self) {
        // TWINT written as zero stays set; only TWIE drops.
        self.write(self.map.twcr, TWCR_TWEN);
    }

    fn data(&self) -> u8 {
        self.read(self.map.twdr)
    }

    fn status(&self) -> u8 {
        self.read(self.map.twsr)
    }
}

/// Records one bus event and masks the interrupt until the next command.
pub fn service_interrupt<H: TwiHardware + ?Sized>(hardware: &mut H, latch: &StatusLatch) {
    let twsr = hardware.status();
    hardware.disarm();
    latch.record(twsr);
}

/// Body of the TWI interrupt vector.
///
/// Records the on-chip TWSR into [`TWI_STATUS`] and clears TWIE. TWINT stays
/// set, holding the bus, until the next command clears it.
///
/// # Safety
///
/// Must only run on an ATmega328P, from the TWI vector.
pub unsafe fn twi_interrupt() {
    // SAFETY: the vector runs with the main context suspended, and touches
    // only TWSR and TWCR of the on-chip block.
    let mut twi = unsafe { Atmega328pTwi::new(ATMEGA328P_TWI) };
    service_interrupt(&mut twi, &TWI_STATUS);
}
