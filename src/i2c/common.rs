// Licensed under the Apache-2.0 license

//! Common types and constants for the TWI master driver.
//!
//! This module provides the error taxonomy, bus configuration and the clock
//! divisor computation shared by the controller and its tests.

use core::fmt;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use fugit::HertzU32;

use crate::i2c::timeout::TWI_TIMEOUT;

/// Core clock of the Nano board (`F_CPU`).
pub const CORE_CLOCK: HertzU32 = HertzU32::from_raw(16_000_000);

/// Highest address representable in a 7-bit address byte.
pub const MAX_ADDRESS: u8 = 0x7f;

/// Largest transfer a single transaction accepts.
pub const MAX_TRANSFER: usize = u16::MAX as usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
}

impl From<I2cSpeed> for HertzU32 {
    fn from(speed: I2cSpeed) -> Self {
        HertzU32::from_raw(speed as u32)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Begin condition not observed within the timeout.
    Start,
    /// Repeated begin condition not observed within the timeout.
    Restart,
    /// Address or data byte not acknowledged by the remote device.
    NotAcknowledged(NoAcknowledgeSource),
    /// Pull-ups requested while MCUCR.PUD disables them globally.
    PullupsDisabled,
    InvalidSpeed,
    InvalidAddress,
    InvalidLength,
}

impl Error {
    /// Numeric code printed on the serial console.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Error::Start => 1,
            Error::Restart => 2,
            Error::NotAcknowledged(_) => 3,
            Error::PullupsDisabled => 4,
            Error::InvalidSpeed => 5,
            Error::InvalidAddress => 6,
            Error::InvalidLength => 7,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Start => f.write_str("start condition not observed"),
            Error::Restart => f.write_str("repeated start condition not observed"),
            Error::NotAcknowledged(NoAcknowledgeSource::Address) => {
                f.write_str("address not acknowledged")
            }
            Error::NotAcknowledged(NoAcknowledgeSource::Data) => {
                f.write_str("data not acknowledged")
            }
            Error::NotAcknowledged(NoAcknowledgeSource::Unknown) => {
                f.write_str("not acknowledged")
            }
            Error::PullupsDisabled => f.write_str("pull-ups requested while globally disabled"),
            Error::InvalidSpeed => f.write_str("bus speed must be non-zero"),
            Error::InvalidAddress => f.write_str("address exceeds 7 bits"),
            Error::InvalidLength => f.write_str("transfer length out of range"),
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match *self {
            Error::Start | Error::Restart => ErrorKind::Bus,
            Error::NotAcknowledged(source) => ErrorKind::NoAcknowledge(source),
            Error::PullupsDisabled
            | Error::InvalidSpeed
            | Error::InvalidAddress
            | Error::InvalidLength => ErrorKind::Other,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PullupPolicy {
    /// Lines are pulled up by resistors on the board.
    External,
    /// PC4/PC5 internal pull-ups are engaged.
    Internal,
}

/// Settings programmed by `init`, held for the lifetime of the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusConfiguration {
    pub divisor: u8,
    pub pullups: PullupPolicy,
}

impl BusConfiguration {
    /// # Errors
    ///
    /// Returns `Error::InvalidSpeed` for a zero bus speed.
    pub fn compute(
        core_clock: HertzU32,
        speed: HertzU32,
        pullups_enabled: bool,
    ) -> Result<Self, Error> {
        Ok(Self {
            divisor: clock_divisor(core_clock, speed)?,
            pullups: if pullups_enabled {
                PullupPolicy::Internal
            } else {
                PullupPolicy::External
            },
        })
    }
}

/// TWBR value for `speed` with prescaler 1.
///
/// SCL = F / (16 + 2 * TWBR), so TWBR = round((F / SCL - 16) / 2). Speeds
/// faster than F / 16 give 0; slow speeds saturate at 255.
///
/// # Errors
///
/// Returns `Error::InvalidSpeed` for a zero bus speed.
pub fn clock_divisor(core_clock: HertzU32, speed: HertzU32) -> Result<u8, Error> {
    let f = u64::from(core_clock.raw());
    let scl = u64::from(speed.raw());
    if scl == 0 {
        return Err(Error::InvalidSpeed);
    }
    // (F - 16 * SCL) / (2 * SCL), rounded half up.
    let twbr = (f + scl).saturating_sub(16 * scl) / (2 * scl);
    Ok(u8::try_from(twbr).unwrap_or(u8::MAX))
}

#[derive(Copy, Clone, Debug)]
pub struct I2cConfig {
    pub core_clock: HertzU32,
    pub speed: HertzU32,
    pub pullups: bool,
    pub timeout: u16,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

pub struct I2cConfigBuilder {
    core_clock: HertzU32,
    speed: HertzU32,
    pullups: bool,
    timeout: u16,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            core_clock: CORE_CLOCK,
            speed: I2cSpeed::Standard.into(),
            pullups: false,
            timeout: TWI_TIMEOUT,
        }
    }
    #[must_use]
    pub fn core_clock(mut self, clock: HertzU32) -> Self {
        self.core_clock = clock;
        self
    }
    #[must_use]
    pub fn speed(mut self, speed: impl Into<HertzU32>) -> Self {
        self.speed = speed.into();
        self
    }
    #[must_use]
    pub fn pullups(mut self, enabled: bool) -> Self {
        self.pullups = enabled;
        self
    }
    /// Overrides the per-phase poll ceiling.
    ///
    /// A ceiling of 0 is accepted but takes no sample at all, so every
    /// transaction then fails with [`Error::Start`] after releasing the bus.
    #[must_use]
    pub fn timeout(mut self, ceiling: u16) -> Self {
        self.timeout = ceiling;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            core_clock: self.core_clock,
            speed: self.speed,
            pullups: self.pullups,
            timeout: self.timeout,
        }
    }
}
