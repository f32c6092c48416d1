// Licensed under the Apache-2.0 license

//! Pull-up lines of the TWI pins.
//!
//! SDA and SCL are PC4 and PC5. With the pin configured as input, setting its
//! PORTC bit engages the internal pull-up unless MCUCR.PUD disables pull-ups
//! for the whole chip.
//!
//! PORTC is shared with the general digital-I/O code. The TWI initializer
//! writes it directly with a read-modify-write, so nothing else may modify
//! PORTC while `init` runs.

use core::ptr::{read_volatile, write_volatile};

pub const SDA_PIN: u8 = 4;
pub const SCL_PIN: u8 = 5;
pub const TWI_PULLUP_MASK: u8 = (1 << SDA_PIN) | (1 << SCL_PIN);

const MCUCR_PUD: u8 = 1 << 4;

pub trait PullupControl {
    /// State of the global pull-up disable flag.
    fn pullups_disabled(&self) -> bool;

    /// Sets the PORTC bits of SDA and SCL.
    fn engage_pullups(&mut self);
}

#[derive(Copy, Clone, Debug)]
pub struct PortRegisterMap {
    pub portc: usize,
    pub mcucr: usize,
}

pub const ATMEGA328P_PORTS: PortRegisterMap = PortRegisterMap {
    portc: 0x28,
    mcucr: 0x55,
};

pub struct Atmega328pPullups {
    map: PortRegisterMap,
}

impl Atmega328pPullups {
    /// # Safety
    ///
    /// Both addresses must be valid for volatile byte access for as long as
    /// the value is used.
    #[must_use]
    pub const unsafe fn new(map: PortRegisterMap) -> Self {
        Self { map }
    }

    /// # Safety
    ///
    /// Must only be called on an ATmega328P.
    #[must_use]
    pub const unsafe fn take() -> Self {
        Self::new(ATMEGA328P_PORTS)
    }
}

impl PullupControl for Atmega328pPullups {
    fn pullups_disabled(&self) -> bool {
        // SAFETY: `new` requires the mapped address to be valid.
        let mcucr = unsafe { read_volatile(self.map.mcucr as *const u8) };
        mcucr & MCUCR_PUD != 0
    }

    fn engage_pullups(&mut self) {
        let portc = self.map.portc as *mut u8;
        // SAFETY: `new` requires the mapped address to be valid.
        unsafe { write_volatile(portc, read_volatile(portc) | TWI_PULLUP_MASK) }
    }
}
