// Licensed under the Apache-2.0 license

//! DS3231 real-time clock.
//!
//! The seven timekeeping registers start at 0x00 and hold BCD values:
//! seconds, minutes, hours, weekday, date, month and year. The clock is run in
//! 24-hour mode; the century bit of the month register is ignored, so years
//! are 2000..=2099.

use core::fmt;

use crate::i2c::traits::RegisterAccess;

pub const DS3231_ADDRESS: u8 = 0x68;
const TIME_REGISTER: u8 = 0x00;

const SECONDS_MASK: u8 = 0x7f;
const MINUTES_MASK: u8 = 0x7f;
const HOURS_24_MASK: u8 = 0x3f;
const WEEKDAY_MASK: u8 = 0x07;
const DATE_MASK: u8 = 0x3f;
const MONTH_MASK: u8 = 0x1f;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DateTime {
    /// Years since 2000.
    pub year: u8,
    pub month: u8,
    pub date: u8,
    /// 1..=7, the meaning of 1 is up to the application.
    pub weekday: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0f)
}

fn to_bcd(value: u8) -> u8 {
    let value = value % 100;
    ((value / 10) << 4) | (value % 10)
}

impl DateTime {
    /// Decodes the register block as read starting at register 0x00.
    #[must_use]
    pub fn from_registers(raw: [u8; 7]) -> Self {
        let [seconds, minutes, hours, weekday, date, month, year] = raw;
        Self {
            year: from_bcd(year),
            month: from_bcd(month & MONTH_MASK),
            date: from_bcd(date & DATE_MASK),
            weekday: from_bcd(weekday & WEEKDAY_MASK),
            hours: from_bcd(hours & HOURS_24_MASK),
            minutes: from_bcd(minutes & MINUTES_MASK),
            seconds: from_bcd(seconds & SECONDS_MASK),
        }
    }

    /// Encodes the register block, selecting 24-hour mode.
    #[must_use]
    pub fn to_registers(&self) -> [u8; 7] {
        [
            to_bcd(self.seconds) & SECONDS_MASK,
            to_bcd(self.minutes) & MINUTES_MASK,
            to_bcd(self.hours) & HOURS_24_MASK,
            to_bcd(self.weekday) & WEEKDAY_MASK,
            to_bcd(self.date) & DATE_MASK,
            to_bcd(self.month) & MONTH_MASK,
            to_bcd(self.year),
        ]
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "20{:02}/{:02}/{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.date, self.hours, self.minutes, self.seconds
        )
    }
}

pub struct Ds3231<B: RegisterAccess> {
    bus: B,
}

impl<B: RegisterAccess> Ds3231<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// # Errors
    ///
    /// Returns the bus error if the register write fails.
    pub fn set_time(&mut self, time: &DateTime) -> Result<(), B::Error> {
        self.bus
            .write_registers(DS3231_ADDRESS, TIME_REGISTER, &time.to_registers())
    }

    /// # Errors
    ///
    /// Returns the bus error if the register read fails.
    pub fn read_time(&mut self) -> Result<DateTime, B::Error> {
        let mut raw = [0u8; 7];
        self.bus
            .read_registers(DS3231_ADDRESS, TIME_REGISTER, &mut raw)?;
        Ok(DateTime::from_registers(raw))
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn release(self) -> B {
        self.bus
    }
}
