// Licensed under the Apache-2.0 license

//! Phase-level TWI master primitives.
//!
//! Each primitive issues one hardware command and waits, bounded by the poll
//! ceiling, for the status that confirms it. The next command is never issued
//! before the previous one was confirmed or has failed. `stop` is the only
//! primitive that does not wait: releasing the bus can never hang.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::Error;
use crate::i2c::status::{Phase, StatusSource};
use crate::i2c::timeout;
use crate::i2c::traits::TwiHardware;

/// Protocol position of the master.
///
/// Write counts include the register byte, so a register write that has
/// just been acknowledged is `DataWriteAcked(1)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusState {
    Idle,
    StartSent,
    AddressWriteAcked,
    DataWriteAcked(u16),
    RestartSent,
    AddressReadAcked,
    DataReadAcked(u16),
    Done,
    Error,
}

impl BusState {
    /// Whether `phase` may be issued from this state.
    #[must_use]
    pub fn accepts(self, phase: Phase) -> bool {
        use BusState::*;
        match phase {
            Phase::Start => self == Idle,
            Phase::Restart => matches!(
                self,
                AddressWriteAcked | DataWriteAcked(_) | AddressReadAcked | DataReadAcked(_)
            ),
            Phase::AddressWrite | Phase::AddressRead => matches!(self, StartSent | RestartSent),
            Phase::DataWrite => matches!(self, AddressWriteAcked | DataWriteAcked(_)),
            Phase::DataReadAck | Phase::DataReadNack => {
                matches!(self, AddressReadAcked | DataReadAcked(_))
            }
        }
    }

    fn after(self, phase: Phase) -> Self {
        match phase {
            Phase::Start => BusState::StartSent,
            Phase::Restart => BusState::RestartSent,
            Phase::AddressWrite => BusState::AddressWriteAcked,
            Phase::AddressRead => BusState::AddressReadAcked,
            Phase::DataWrite => match self {
                BusState::DataWriteAcked(n) => BusState::DataWriteAcked(n.saturating_add(1)),
                _ => BusState::DataWriteAcked(1),
            },
            Phase::DataReadAck | Phase::DataReadNack => match self {
                BusState::DataReadAcked(n) => BusState::DataReadAcked(n.saturating_add(1)),
                _ => BusState::DataReadAcked(1),
            },
        }
    }
}

pub struct BusController<H: TwiHardware, S: StatusSource, L: Logger = NoOpLogger> {
    hardware: H,
    status: S,
    logger: L,
    timeout: u16,
    state: BusState,
}

impl<H: TwiHardware, S: StatusSource, L: Logger> BusController<H, S, L> {
    pub fn new(hardware: H, status: S, logger: L, timeout: u16) -> Self {
        Self {
            hardware,
            status,
            logger,
            timeout,
            state: BusState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> BusState {
        self.state
    }

    #[must_use]
    pub fn timeout(&self) -> u16 {
        self.timeout
    }

    pub fn set_timeout(&mut self, ceiling: u16) {
        self.timeout = ceiling;
    }

    #[must_use]
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    #[must_use]
    pub fn status(&self) -> &S {
        &self.status
    }

    pub fn logger_mut(&mut self) -> &mut L {
        &mut self.logger
    }

    pub fn into_parts(self) -> (H, S, L) {
        (self.hardware, self.status, self.logger)
    }

    /// # Errors
    ///
    /// `Error::Start` if the start condition is not confirmed.
    pub fn start(&mut self) -> Result<(), Error> {
        self.issue(Phase::Start, H::begin)
    }

    /// # Errors
    ///
    /// `Error::Restart` if the repeated start is not confirmed.
    pub fn restart(&mut self) -> Result<(), Error> {
        self.issue(Phase::Restart, H::begin)
    }

    /// Releases the bus without waiting for any confirmation.
    pub fn stop(&mut self) {
        self.hardware.end();
        self.state = BusState::Idle;
    }

    /// Sends SLA+W.
    ///
    /// # Errors
    ///
    /// `Error::NotAcknowledged(Address)` if the device does not answer.
    pub fn address_write_ack(&mut self, address: u8) -> Result<(), Error> {
        self.issue(Phase::AddressWrite, |hw| hw.transmit(address << 1))
    }

    /// # Errors
    ///
    /// `Error::NotAcknowledged(Data)` if the byte is not acknowledged.
    pub fn data_write_ack(&mut self, byte: u8) -> Result<(), Error> {
        self.issue(Phase::DataWrite, |hw| hw.transmit(byte))
    }

    /// Sends SLA+R.
    ///
    /// # Errors
    ///
    /// `Error::NotAcknowledged(Address)` if the device does not answer.
    pub fn address_read_ack(&mut self, address: u8) -> Result<(), Error> {
        self.issue(Phase::AddressRead, |hw| hw.transmit((address << 1) | 0x01))
    }

    /// Receives one byte and answers it with ACK (`continue_with_ack`) or
    /// NACK, which tells the device this was the last byte.
    ///
    /// # Errors
    ///
    /// `Error::NotAcknowledged(Data)` if the byte is not confirmed.
    pub fn data_read_ack(&mut self, continue_with_ack: bool) -> Result<u8, Error> {
        let phase = if continue_with_ack {
            Phase::DataReadAck
        } else {
            Phase::DataReadNack
        };
        self.issue(phase, |hw| hw.receive(continue_with_ack))?;
        Ok(self.hardware.data())
    }

    /// Marks the transfer finished; `stop` follows.
    pub fn complete(&mut self) {
        self.state = BusState::Done;
    }

    fn issue<F>(&mut self, phase: Phase, command: F) -> Result<(), Error>
    where
        F: FnOnce(&mut H),
    {
        debug_assert!(
            self.state.accepts(phase),
            "{phase:?} issued from {:?}",
            self.state
        );

        let armed = self.status.epoch();
        command(&mut self.hardware);

        match timeout::wait_for(&self.status, phase, armed, self.timeout) {
            Ok(()) => {
                self.state = self.state.after(phase);
                Ok(())
            }
            Err(timeout) => {
                self.logger.debug(format_args!(
                    "twi {:?}: expected {:?}, last saw {:?}",
                    phase,
                    phase.expected(),
                    timeout.last_seen
                ));
                self.state = BusState::Error;
                Err(timeout.error())
            }
        }
    }
}
