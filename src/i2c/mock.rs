// Licensed under the Apache-2.0 license

//! Test doubles for the TWI driver.
//!
//! [`SimulatedTwi`] answers each command the way the TWI and a register-file
//! device (DS3231, 24Cxx) would. Each posted status sets TWINT and runs the
//! driver's own interrupt body, [`service_interrupt`], against a
//! [`StatusLatch`]. Every command is logged together with the latch contents
//! seen at the moment it was issued.
//!
//! With `refire_previous`, the simulated vector is level-triggered like the
//! AVR one: while TWINT and TWIE are both still set, it fires again at the
//! start of the next command, before that command takes effect.

use std::cell::Cell;
use std::string::String;
use std::vec::Vec;

use core::fmt;

use crate::common::Logger;
use crate::gpio::PullupControl;
use crate::i2c::atmega328p::service_interrupt;
use crate::i2c::status::{BusStatus, Sample, StatusLatch, StatusSource};
use crate::i2c::traits::TwiHardware;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Enable,
    Divisor(u8),
    Begin,
    End,
    Transmit(u8),
    Receive { ack: bool },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub event: BusEvent,
    /// Latch contents when the command was issued.
    pub latch_before: BusStatus,
    /// Status posted in response, `None` when the hardware stayed silent.
    pub posted: Option<BusStatus>,
}

pub struct SimulatedTwi<'a> {
    latch: &'a StatusLatch,
    pub device: u8,
    pub memory: [u8; 256],
    pub log: Vec<Record>,
    /// Device ignores its address.
    pub nack_address: bool,
    /// Device accepts this many bytes after SLA+W, then NACKs.
    pub nack_data_after: Option<usize>,
    /// Number of commands answered before the hardware goes quiet.
    pub silent_after: Option<usize>,
    /// Code posted right after every genuine status, overwriting it.
    pub clobber_with: Option<u8>,
    /// Prescaler bits left in TWSR; the latch must mask them.
    pub prescaler_bits: u8,
    /// Vector re-enters while TWINT and TWIE are set.
    pub refire_previous: bool,
    /// Number of times the vector re-entered for an already recorded event.
    pub refires: usize,
    pub divisor: Option<u8>,
    pub enabled: bool,
    answered: usize,
    active: bool,
    expect_address: bool,
    selected: bool,
    reading: bool,
    pointer_pending: bool,
    pointer: u8,
    accepted: usize,
    data: u8,
    twsr: u8,
    twint: bool,
    interrupt_enabled: bool,
}

impl<'a> SimulatedTwi<'a> {
    pub fn new(latch: &'a StatusLatch, device: u8) -> Self {
        Self {
            latch,
            device,
            memory: [0; 256],
            log: Vec::new(),
            nack_address: false,
            nack_data_after: None,
            silent_after: None,
            clobber_with: None,
            prescaler_bits: 0,
            refire_previous: false,
            refires: 0,
            divisor: None,
            enabled: false,
            answered: 0,
            active: false,
            expect_address: false,
            selected: false,
            reading: false,
            pointer_pending: false,
            pointer: 0,
            accepted: 0,
            data: 0xff,
            twsr: BusStatus::Idle.code(),
            twint: false,
            interrupt_enabled: false,
        }
    }

    /// TWIE as last written.
    pub fn interrupt_enabled(&self) -> bool {
        self.interrupt_enabled
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.log.iter().map(|record| record.event).collect()
    }

    pub fn count(&self, event: BusEvent) -> usize {
        self.log.iter().filter(|record| record.event == event).count()
    }

    /// Ack flags of every `receive` command, in order.
    pub fn read_acks(&self) -> Vec<bool> {
        self.log
            .iter()
            .filter_map(|record| match record.event {
                BusEvent::Receive { ack } => Some(ack),
                _ => None,
            })
            .collect()
    }

    pub fn transmitted(&self) -> Vec<u8> {
        self.log
            .iter()
            .filter_map(|record| match record.event {
                BusEvent::Transmit(byte) => Some(byte),
                _ => None,
            })
            .collect()
    }

    fn issue(&mut self, event: BusEvent, response: Option<BusStatus>) {
        let latch = self.latch;
        let latch_before = latch.current();
        if self.refire_previous && self.twint && self.interrupt_enabled {
            self.refires += 1;
            latch.record(self.twsr);
        }
        // The command's TWCR write clears TWINT and sets TWIE.
        self.twint = false;
        self.interrupt_enabled = true;

        let posted = response.filter(|_| self.silent_after.map_or(true, |n| self.answered < n));
        if let Some(status) = posted {
            self.answered += 1;
            self.twsr = status.code() | self.prescaler_bits;
            self.twint = true;
            service_interrupt(self, latch);
            if let Some(code) = self.clobber_with {
                latch.record(code);
            }
        }
        self.log.push(Record {
            event,
            latch_before,
            posted,
        });
    }

    fn address_phase(&mut self, byte: u8) -> BusStatus {
        self.expect_address = false;
        self.reading = byte & 0x01 != 0;
        let acked = byte >> 1 == self.device && !self.nack_address;
        self.selected = acked;
        self.pointer_pending = acked && !self.reading;
        self.accepted = 0;
        match (self.reading, acked) {
            (false, true) => BusStatus::AddressWriteAck,
            (false, false) => BusStatus::AddressWriteNack,
            (true, true) => BusStatus::AddressReadAck,
            (true, false) => BusStatus::AddressReadNack,
        }
    }

    fn data_phase(&mut self, byte: u8) -> BusStatus {
        if !self.selected || self.reading {
            return BusStatus::DataWriteNack;
        }
        if self.nack_data_after.is_some_and(|n| self.accepted >= n) {
            return BusStatus::DataWriteNack;
        }
        self.accepted += 1;
        if self.pointer_pending {
            self.pointer_pending = false;
            self.pointer = byte;
        } else {
            self.memory[usize::from(self.pointer)] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
        BusStatus::DataWriteAck
    }
}

impl TwiHardware for SimulatedTwi<'_> {
    fn enable(&mut self) {
        self.enabled = true;
        self.interrupt_enabled = true;
        self.log.push(Record {
            event: BusEvent::Enable,
            latch_before: self.latch.current(),
            posted: None,
        });
    }

    fn set_divisor(&mut self, divisor: u8) {
        self.divisor = Some(divisor);
        self.log.push(Record {
            event: BusEvent::Divisor(divisor),
            latch_before: self.latch.current(),
            posted: None,
        });
    }

    fn begin(&mut self) {
        let status = if self.active {
            BusStatus::RestartSent
        } else {
            BusStatus::StartSent
        };
        self.active = true;
        self.expect_address = true;
        self.selected = false;
        self.issue(BusEvent::Begin, Some(status));
    }

    fn end(&mut self) {
        self.active = false;
        self.expect_address = false;
        self.selected = false;
        self.issue(BusEvent::End, None);
    }

    fn transmit(&mut self, byte: u8) {
        self.data = byte;
        let status = if self.expect_address {
            self.address_phase(byte)
        } else {
            self.data_phase(byte)
        };
        self.issue(BusEvent::Transmit(byte), Some(status));
    }

    fn receive(&mut self, ack: bool) {
        if self.selected && self.reading {
            self.data = self.memory[usize::from(self.pointer)];
            self.pointer = self.pointer.wrapping_add(1);
        } else {
            self.data = 0xff;
        }
        let status = if ack {
            BusStatus::DataReadAck
        } else {
            BusStatus::DataReadNack
        };
        self.issue(BusEvent::Receive { ack }, Some(status));
    }

    fn disarm(&mut self) {
        self.interrupt_enabled = false;
    }

    fn data(&self) -> u8 {
        self.data
    }

    fn status(&self) -> u8 {
        self.twsr
    }
}

/// Counts every status sample taken by a phase wait.
pub struct CountingSource<'a> {
    inner: &'a StatusLatch,
    polls: Cell<u32>,
}

impl<'a> CountingSource<'a> {
    pub fn new(inner: &'a StatusLatch) -> Self {
        Self {
            inner,
            polls: Cell::new(0),
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls.get()
    }

    pub fn reset(&self) {
        self.polls.set(0);
    }
}

impl StatusSource for CountingSource<'_> {
    fn sample(&self) -> Sample {
        self.polls.set(self.polls.get() + 1);
        self.inner.sample()
    }

    fn epoch(&self) -> u8 {
        self.inner.epoch()
    }
}

#[derive(Default)]
pub struct RecordingLogger {
    pub debug: Vec<String>,
    pub errors: Vec<String>,
}

impl Logger for RecordingLogger {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.debug.push(std::format!("{args}"));
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.errors.push(std::format!("{args}"));
    }
}

/// Port C and MCUCR as seen by the initializer.
#[derive(Default)]
pub struct MockPullups {
    pub pud: bool,
    pub port: u8,
    pub flag_reads: Cell<usize>,
}

impl PullupControl for MockPullups {
    fn pullups_disabled(&self) -> bool {
        self.flag_reads.set(self.flag_reads.get() + 1);
        self.pud
    }

    fn engage_pullups(&mut self) {
        self.port |= crate::gpio::TWI_PULLUP_MASK;
    }
}

/// Serial sink collecting everything written to it.
#[derive(Default)]
pub struct Capture {
    bytes: Vec<u8>,
}

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl embedded_io::ErrorType for Capture {
    type Error = core::convert::Infallible;
}

impl embedded_io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
