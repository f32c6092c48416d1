// Licensed under the Apache-2.0 license

//! TWI status codes and the latch shared with the interrupt handler.
//!
//! The TWI interrupt fires once per completed bus phase. The handler copies
//! the status register into a single-slot [`StatusLatch`]; the phase waits in
//! the bus controller poll it. The latch is not a queue: an event that is
//! overwritten before a waiter sees it is simply missed, and the waiter
//! reports a timeout.
//!
//! TWSR carries the status in bits 7..3 and the prescaler in bits 1..0. The
//! latch masks the low three bits off and reuses them as an event epoch that
//! the handler bumps on every record, so a waiter can tell a new event from a
//! stale one carrying the same code.
//!
//! The epoch is three bits wide and wraps after eight records. It only tells
//! events apart reliably while each command produces exactly one record,
//! which holds because the handler masks the interrupt after recording.

use core::sync::atomic::{AtomicU8, Ordering};
use embedded_hal::i2c::NoAcknowledgeSource;

use crate::i2c::common::Error;

pub const STATUS_MASK: u8 = 0xf8;
const EPOCH_MASK: u8 = 0x07;

/// Status codes reported by the TWI in master mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BusStatus {
    StartSent = 0x08,
    RestartSent = 0x10,
    AddressWriteAck = 0x18,
    AddressWriteNack = 0x20,
    DataWriteAck = 0x28,
    DataWriteNack = 0x30,
    ArbitrationLost = 0x38,
    AddressReadAck = 0x40,
    AddressReadNack = 0x48,
    DataReadAck = 0x50,
    DataReadNack = 0x58,
    BusError = 0x00,
    /// No relevant state information; TWINT is clear.
    Idle = 0xf8,
    /// Slave-mode and reserved codes, never expected by the master.
    Unrecognized = 0xff,
}

impl BusStatus {
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code & STATUS_MASK {
            0x08 => BusStatus::StartSent,
            0x10 => BusStatus::RestartSent,
            0x18 => BusStatus::AddressWriteAck,
            0x20 => BusStatus::AddressWriteNack,
            0x28 => BusStatus::DataWriteAck,
            0x30 => BusStatus::DataWriteNack,
            0x38 => BusStatus::ArbitrationLost,
            0x40 => BusStatus::AddressReadAck,
            0x48 => BusStatus::AddressReadNack,
            0x50 => BusStatus::DataReadAck,
            0x58 => BusStatus::DataReadNack,
            0x00 => BusStatus::BusError,
            0xf8 => BusStatus::Idle,
            _ => BusStatus::Unrecognized,
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// One protocol phase the bus controller waits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Start,
    Restart,
    AddressWrite,
    DataWrite,
    AddressRead,
    DataReadAck,
    DataReadNack,
}

impl Phase {
    /// Status the hardware posts when the phase succeeded.
    #[must_use]
    pub const fn expected(self) -> BusStatus {
        match self {
            Phase::Start => BusStatus::StartSent,
            Phase::Restart => BusStatus::RestartSent,
            Phase::AddressWrite => BusStatus::AddressWriteAck,
            Phase::DataWrite => BusStatus::DataWriteAck,
            Phase::AddressRead => BusStatus::AddressReadAck,
            Phase::DataReadAck => BusStatus::DataReadAck,
            Phase::DataReadNack => BusStatus::DataReadNack,
        }
    }

    /// Error reported when the expected status never shows up.
    #[must_use]
    pub const fn error(self) -> Error {
        match self {
            Phase::Start => Error::Start,
            Phase::Restart => Error::Restart,
            Phase::AddressWrite | Phase::AddressRead => {
                Error::NotAcknowledged(NoAcknowledgeSource::Address)
            }
            Phase::DataWrite | Phase::DataReadAck | Phase::DataReadNack => {
                Error::NotAcknowledged(NoAcknowledgeSource::Data)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub status: BusStatus,
    pub epoch: u8,
}

/// Anything the phase wait can poll for the latest bus status.
pub trait StatusSource {
    fn sample(&self) -> Sample;

    /// Epoch of the latest event, read before a command is issued.
    fn epoch(&self) -> u8 {
        self.sample().epoch
    }
}

impl<T: StatusSource + ?Sized> StatusSource for &T {
    fn sample(&self) -> Sample {
        (**self).sample()
    }

    fn epoch(&self) -> u8 {
        (**self).epoch()
    }
}

/// Single-slot cell written by the TWI interrupt handler.
pub struct StatusLatch {
    cell: AtomicU8,
}

impl Default for StatusLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: AtomicU8::new(BusStatus::Idle as u8),
        }
    }

    /// Stores the status bits of a raw TWSR value.
    ///
    /// Only the interrupt handler may call this; it is the sole writer, so
    /// reading back its own previous epoch is not a race.
    pub fn record(&self, twsr: u8) {
        let epoch = self.cell.load(Ordering::Relaxed).wrapping_add(1) & EPOCH_MASK;
        self.cell.store((twsr & STATUS_MASK) | epoch, Ordering::Release);
    }

    #[must_use]
    pub fn current(&self) -> BusStatus {
        self.sample().status
    }
}

impl StatusSource for StatusLatch {
    fn sample(&self) -> Sample {
        let raw = self.cell.load(Ordering::Acquire);
        Sample {
            status: BusStatus::from_code(raw),
            epoch: raw & EPOCH_MASK,
        }
    }
}

/// Latch fed by the TWI vector of the running firmware.
pub static TWI_STATUS: StatusLatch = StatusLatch::new();
