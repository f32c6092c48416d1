// Licensed under the Apache-2.0 license

//! USART0 transmitter for the serial console.
//!
//! Only the transmit side is driven. Frames are asynchronous, 8 data bits
//! and one stop bit, with optional parity. On the Nano the port reaches the
//! host through the on-board USB bridge.

use core::convert::Infallible;
use core::ptr::{read_volatile, write_volatile};

use fugit::HertzU32;

const UCSR0A_UDRE0: u8 = 1 << 5;
const UCSR0B_TXEN0: u8 = 1 << 3;
/// UCSZ01:0 = 0b11, 8-bit characters, asynchronous, one stop bit.
const UCSR0C_8BIT: u8 = 0x06;
const UCSR0C_UPM_SHIFT: u8 = 4;
const UBRR_MAX: u16 = 0x0fff;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Parity {
    None = 0b00,
    Even = 0b10,
    Odd = 0b11,
}

pub trait UsartHardware {
    /// Programs UBRR0.
    fn set_baud_divisor(&mut self, ubrr: u16);

    /// Enables the transmitter and selects the frame format.
    fn configure(&mut self, parity: Parity);

    /// UDRE0: the data register can take another byte.
    fn ready(&self) -> bool;

    fn send(&mut self, byte: u8);
}

#[derive(Copy, Clone, Debug)]
pub struct UsartRegisterMap {
    pub ucsr0a: usize,
    pub ucsr0b: usize,
    pub ucsr0c: usize,
    pub ubrr0l: usize,
    pub ubrr0h: usize,
    pub udr0: usize,
}

pub const ATMEGA328P_USART0: UsartRegisterMap = UsartRegisterMap {
    ucsr0a: 0xc0,
    ucsr0b: 0xc1,
    ucsr0c: 0xc2,
    ubrr0l: 0xc4,
    ubrr0h: 0xc5,
    udr0: 0xc6,
};

pub struct Atmega328pUsart {
    map: UsartRegisterMap,
}

impl Atmega328pUsart {
    /// # Safety
    ///
    /// Every address in `map` must be valid for volatile byte access for as
    /// long as the value is used.
    #[must_use]
    pub const unsafe fn new(map: UsartRegisterMap) -> Self {
        Self { map }
    }

    /// # Safety
    ///
    /// Must only be called on an ATmega328P, and only once.
    #[must_use]
    pub const unsafe fn take() -> Self {
        Self::new(ATMEGA328P_USART0)
    }

    fn read(&self, addr: usize) -> u8 {
        // SAFETY: `new` requires every mapped address to be valid.
        unsafe { read_volatile(addr as *const u8) }
    }

    fn write(&mut self, addr: usize, value: u8) {
        // SAFETY: `new` requires every mapped address to be valid.
        unsafe { write_volatile(addr as *mut u8, value) }
    }
}

impl UsartHardware for Atmega328pUsart {
    fn set_baud_divisor(&mut self, ubrr: u16) {
        let [high, low] = ubrr.to_be_bytes();
        // UBRR0H must be written before UBRR0L, which latches both.
        self.write(self.map.ubrr0h, high);
        self.write(self.map.ubrr0l, low);
    }

    fn configure(&mut self, parity: Parity) {
        let ucsr0b = self.read(self.map.ucsr0b);
        self.write(self.map.ucsr0b, ucsr0b | UCSR0B_TXEN0);
        self.write(
            self.map.ucsr0c,
            UCSR0C_8BIT | ((parity as u8) << UCSR0C_UPM_SHIFT),
        );
    }

    fn ready(&self) -> bool {
        self.read(self.map.ucsr0a) & UCSR0A_UDRE0 != 0
    }

    fn send(&mut self, byte: u8) {
        self.write(self.map.udr0, byte);
    }
}

/// UBRR0 for `baud` in normal-speed asynchronous mode.
///
/// UBRR = round(F / (16 * baud)) - 1, clamped to the 12-bit register. A zero
/// baud rate selects the slowest setting.
#[must_use]
pub fn baud_divisor(core_clock: HertzU32, baud: u32) -> u16 {
    let f = u64::from(core_clock.raw());
    let divisor = 16 * u64::from(baud);
    if divisor == 0 {
        return UBRR_MAX;
    }
    let ubrr = ((f + divisor / 2) / divisor).saturating_sub(1);
    u16::try_from(ubrr).map_or(UBRR_MAX, |ubrr| ubrr.min(UBRR_MAX))
}

pub struct UartController<H: UsartHardware> {
    hardware: H,
    ubrr: u16,
}

impl<H: UsartHardware> UartController<H> {
    /// Programs the baud rate and enables the transmitter, 8N1.
    pub fn new(hardware: H, core_clock: HertzU32, baud: u32) -> Self {
        Self::with_parity(hardware, core_clock, baud, Parity::None)
    }

    pub fn with_parity(mut hardware: H, core_clock: HertzU32, baud: u32, parity: Parity) -> Self {
        let ubrr = baud_divisor(core_clock, baud);
        hardware.set_baud_divisor(ubrr);
        hardware.configure(parity);
        Self { hardware, ubrr }
    }

    #[must_use]
    pub fn baud_divisor(&self) -> u16 {
        self.ubrr
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Queues one byte if the data register is free.
    ///
    /// # Errors
    ///
    /// `WouldBlock` while the previous byte is still being shifted out.
    pub fn write_byte(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        if !self.hardware.ready() {
            return Err(nb::Error::WouldBlock);
        }
        self.hardware.send(byte);
        Ok(())
    }

    /// Sends `count` line feeds, then a carriage return if requested.
    pub fn write_newlines(&mut self, count: usize, carriage_return: bool) {
        for _ in 0..count {
            self.send_blocking(b'\n');
        }
        if carriage_return {
            self.send_blocking(b'\r');
        }
    }

    fn send_blocking(&mut self, byte: u8) {
        match nb::block!(self.write_byte(byte)) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }
}

impl<H: UsartHardware> embedded_io::ErrorType for UartController<H> {
    type Error = Infallible;
}

impl<H: UsartHardware> embedded_io::Write for UartController<H> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            nb::block!(self.write_byte(byte))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        while !self.hardware.ready() {
            core::hint::spin_loop();
        }
        Ok(())
    }
}
