// Licensed under the Apache-2.0 license

//! # TWI Hardware Abstraction Traits
//!
//! The bus controller never touches register bits itself. It talks to a
//! [`TwiHardware`] capability, which maps each protocol command onto one
//! write of the control register:
//!
//! ```text
//! TwiHardware (register block)
//!     ├── Atmega328pTwi   (memory-mapped TWBR/TWSR/TWDR/TWCR)
//!     └── SimulatedTwi    (test double, posts status into a latch)
//! RegisterAccess (device-register transfers)
//!     └── I2cController
//! ```
//!
//! Every command except `enable`, `set_divisor` and `disarm` hands the bus to
//! the hardware. Completion is reported asynchronously through the TWI interrupt,
//! never by the command itself.

/// Command-level access to one TWI register block.
pub trait TwiHardware {
    /// Switches the module on with its interrupt enabled.
    fn enable(&mut self);

    /// Programs the bit-rate register and selects prescaler 1.
    fn set_divisor(&mut self, divisor: u8);

    /// Requests a (repeated) start condition.
    fn begin(&mut self);

    /// Requests a stop condition. The hardware posts no status afterwards.
    fn end(&mut self);

    /// Loads `byte` into the data register and shifts it out.
    fn transmit(&mut self, byte: u8);

    /// Shifts one byte in, answering it with ACK when `ack` is set.
    fn receive(&mut self, ack: bool);

    /// Masks the TWI interrupt while leaving TWINT set, so the level-triggered
    /// vector does not run again for the same event. The next command
    /// re-enables it.
    fn disarm(&mut self);

    /// Contents of the data register.
    fn data(&self) -> u8;

    /// Raw status register, prescaler bits included.
    fn status(&self) -> u8;
}

/// Register-addressed transfers to a device on the bus.
///
/// # Examples
///
/// ```rust,ignore
/// fn read_seconds<B: RegisterAccess>(bus: &mut B) -> Result<u8, B::Error> {
///     let mut raw = [0u8; 1];
///     bus.read_registers(0x68, 0x00, &mut raw)?;
///     Ok(raw[0] & 0x7f)
/// }
/// ```
pub trait RegisterAccess {
    type Error: core::fmt::Debug;

    /// Writes `data` to consecutive registers starting at `register`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails at any phase.
    fn write_registers(&mut self, address: u8, register: u8, data: &[u8])
        -> Result<(), Self::Error>;

    /// Fills `buffer` from consecutive registers starting at `register`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails at any phase.
    fn read_registers(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Self::Error>;
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &mut T {
    type Error = T::Error;

    fn write_registers(
        &mut self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        (**self).write_registers(address, register, data)
    }

    fn read_registers(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        (**self).read_registers(address, register, buffer)
    }
}
