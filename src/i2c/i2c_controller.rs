// Licensed under the Apache-2.0 license

//! TWI master transactions for the ATmega328P.
//!
//! [`I2cController`] sequences the bus primitives into register-addressed
//! reads and writes, and implements the embedded-hal `I2c` trait on top of
//! the same primitives. A failed phase aborts the sequence and the bus is
//! released before the error is returned; no transaction is ever retried.

use embedded_hal::i2c::{Operation, SevenBitAddress};
use fugit::HertzU32;

use crate::common::{Logger, NoOpLogger};
use crate::gpio::PullupControl;
use crate::i2c::atmega328p::service_interrupt;
use crate::i2c::bus::BusController;
use crate::i2c::common::{BusConfiguration, Error, I2cConfig, MAX_ADDRESS, MAX_TRANSFER};
use crate::i2c::status::{StatusLatch, StatusSource, TWI_STATUS};
use crate::i2c::traits::{RegisterAccess, TwiHardware};

pub struct I2cController<
    H: TwiHardware,
    P: PullupControl,
    S: StatusSource = &'static StatusLatch,
    L: Logger = NoOpLogger,
> {
    bus: BusController<H, S, L>,
    pullups: P,
    config: I2cConfig,
    bus_config: Option<BusConfiguration>,
}

impl<H: TwiHardware, P: PullupControl> I2cController<H, P> {
    /// Controller fed by the firmware's [`TWI_STATUS`] latch.
    pub fn new(hardware: H, pullups: P, config: I2cConfig) -> Self {
        Self::with_parts(hardware, pullups, &TWI_STATUS, NoOpLogger, config)
    }
}

impl<H: TwiHardware, P: PullupControl, S: StatusSource, L: Logger> I2cController<H, P, S, L> {
    pub fn with_parts(hardware: H, pullups: P, status: S, logger: L, config: I2cConfig) -> Self {
        Self {
            bus: BusController::new(hardware, status, logger, config.timeout),
            pullups,
            config,
            bus_config: None,
        }
    }

    /// Programs the bit rate and enables the module and its interrupt.
    ///
    /// With `pullups_enabled`, PC4 and PC5 pull-ups are engaged unless
    /// MCUCR.PUD disables them, in which case the port is left alone and the
    /// call fails. Without it the port and the flag are never touched.
    ///
    /// # Errors
    ///
    /// `InvalidSpeed` for a zero speed, `PullupsDisabled` if pull-ups were
    /// requested while globally disabled.
    pub fn init(
        &mut self,
        speed: HertzU32,
        pullups_enabled: bool,
    ) -> Result<BusConfiguration, Error> {
        let bus_config = BusConfiguration::compute(self.config.core_clock, speed, pullups_enabled)?;

        let hardware = self.bus.hardware_mut();
        hardware.set_divisor(bus_config.divisor);
        hardware.enable();

        if pullups_enabled {
            if self.pullups.pullups_disabled() {
                self.bus
                    .logger_mut()
                    .error(format_args!("twi init: pull-ups requested but MCUCR.PUD is set"));
                return Err(Error::PullupsDisabled);
            }
            self.pullups.engage_pullups();
        }

        self.config.speed = speed;
        self.config.pullups = pullups_enabled;
        self.bus_config = Some(bus_config);
        self.bus.logger_mut().debug(format_args!(
            "twi init: {} Hz, divisor {}",
            speed.raw(),
            bus_config.divisor
        ));
        Ok(bus_config)
    }

    /// `init` with the speed and pull-up setting of the stored config.
    ///
    /// # Errors
    ///
    /// Same as [`Self::init`].
    pub fn init_from_config(&mut self) -> Result<BusConfiguration, Error> {
        self.init(self.config.speed, self.config.pullups)
    }

    #[must_use]
    pub fn bus_configuration(&self) -> Option<BusConfiguration> {
        self.bus_config
    }

    #[must_use]
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    #[must_use]
    pub fn bus(&self) -> &BusController<H, S, L> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut BusController<H, S, L> {
        &mut self.bus
    }

    #[must_use]
    pub fn pullups(&self) -> &P {
        &self.pullups
    }

    /// Records this controller's TWSR into `latch` and masks the interrupt
    /// until the next command.
    ///
    /// Interrupt body for boards whose TWI is not at the default address;
    /// the default block uses [`crate::i2c::twi_interrupt`].
    pub fn handle_interrupt(&mut self, latch: &StatusLatch) {
        service_interrupt(self.bus.hardware_mut(), latch);
    }

    /// Writes `data` to consecutive registers of `address`, starting at
    /// `register`. An empty `data` only selects the register.
    ///
    /// # Errors
    ///
    /// `InvalidAddress`/`InvalidLength` before any bus traffic, otherwise the
    /// error of the first phase that failed.
    pub fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), Error> {
        check_address(address)?;
        check_length(data.len())?;

        let result = self.write_phases(address, register, data);
        self.finish("write", address, result)
    }

    /// Fills `data` from consecutive registers of `address`, starting at
    /// `register`. Every byte but the last is acknowledged.
    ///
    /// # Errors
    ///
    /// `InvalidAddress`, or `InvalidLength` for an empty or oversized buffer,
    /// before any bus traffic. Otherwise the error of the first phase that
    /// failed.
    pub fn read(&mut self, address: u8, register: u8, data: &mut [u8]) -> Result<(), Error> {
        check_address(address)?;
        if data.is_empty() {
            return Err(Error::InvalidLength);
        }
        check_length(data.len())?;

        let result = self.read_phases(address, register, data);
        self.finish("read", address, result)
    }

    fn write_phases(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), Error> {
        self.bus.start()?;
        self.bus.address_write_ack(address)?;
        self.bus.data_write_ack(register)?;
        for &byte in data {
            self.bus.data_write_ack(byte)?;
        }
        Ok(())
    }

    fn read_phases(&mut self, address: u8, register: u8, data: &mut [u8]) -> Result<(), Error> {
        self.bus.start()?;
        self.bus.address_write_ack(address)?;
        self.bus.data_write_ack(register)?;
        self.bus.restart()?;
        self.bus.address_read_ack(address)?;
        self.receive_into(data, true)
    }

    /// Reads `buffer.len()` bytes, NACKing the last one if `last_in_transfer`.
    fn receive_into(&mut self, buffer: &mut [u8], last_in_transfer: bool) -> Result<(), Error> {
        let last = buffer.len().saturating_sub(1);
        for (index, slot) in buffer.iter_mut().enumerate() {
            *slot = self.bus.data_read_ack(!(last_in_transfer && index == last))?;
        }
        Ok(())
    }

    fn run_operations(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let mut direction: Option<bool> = None;
        let mut operations = operations.iter_mut().peekable();

        while let Some(operation) = operations.next() {
            let reading = matches!(operation, Operation::Read(_));
            if direction != Some(reading) {
                if direction.is_none() {
                    self.bus.start()?;
                } else {
                    self.bus.restart()?;
                }
                if reading {
                    self.bus.address_read_ack(address)?;
                } else {
                    self.bus.address_write_ack(address)?;
                }
                direction = Some(reading);
            }

            match operation {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        self.bus.data_write_ack(byte)?;
                    }
                }
                Operation::Read(buffer) => {
                    let more = matches!(operations.peek(), Some(Operation::Read(_)));
                    self.receive_into(buffer, !more)?;
                }
            }
        }
        Ok(())
    }

    /// Releases the bus exactly once and hands `result` back unchanged.
    fn finish(&mut self, label: &str, address: u8, result: Result<(), Error>) -> Result<(), Error> {
        match result {
            Ok(()) => self.bus.complete(),
            Err(err) => self
                .bus
                .logger_mut()
                .error(format_args!("twi {label} at {address:#04x} failed: {err}")),
        }
        self.bus.stop();
        result
    }
}

fn check_address(address: u8) -> Result<(), Error> {
    if address > MAX_ADDRESS {
        return Err(Error::InvalidAddress);
    }
    Ok(())
}

fn check_length(len: usize) -> Result<(), Error> {
    if len > MAX_TRANSFER {
        return Err(Error::InvalidLength);
    }
    Ok(())
}

impl<H: TwiHardware, P: PullupControl, S: StatusSource, L: Logger> RegisterAccess
    for I2cController<H, P, S, L>
{
    type Error = Error;

    fn write_registers(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), Error> {
        self.write(address, register, data)
    }

    fn read_registers(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.read(address, register, buffer)
    }
}

impl<H: TwiHardware, P: PullupControl, S: StatusSource, L: Logger> embedded_hal::i2c::ErrorType
    for I2cController<H, P, S, L>
{
    type Error = Error;
}

impl<H: TwiHardware, P: PullupControl, S: StatusSource, L: Logger> embedded_hal::i2c::I2c
    for I2cController<H, P, S, L>
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        check_address(address)?;
        for operation in operations.iter() {
            match operation {
                Operation::Read(buffer) if buffer.is_empty() => return Err(Error::InvalidLength),
                Operation::Read(buffer) => check_length(buffer.len())?,
                Operation::Write(bytes) => check_length(bytes.len())?,
            }
        }
        if operations.is_empty() {
            return Ok(());
        }

        let result = self.run_operations(address, operations);
        self.finish("transaction", address, result)
    }
}
