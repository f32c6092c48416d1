// Licensed under the Apache-2.0 license

//! ATmega328P TWI (I2C) master driver.
//!
//! The driver is layered bottom-up: the interrupt handler feeds a
//! [`StatusLatch`], [`timeout`] bounds every wait on it, [`BusController`]
//! issues one protocol phase at a time, and [`I2cController`] sequences the
//! phases into complete transactions. Everything is synchronous and
//! busy-waits; only the latch is shared with interrupt context.

pub mod atmega328p;
pub mod bus;
pub mod common;
pub mod i2c_controller;
pub mod status;
pub mod timeout;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use atmega328p::{
    service_interrupt, twi_interrupt, Atmega328pTwi, TwiRegisterMap, ATMEGA328P_TWI,
};
pub use bus::{BusController, BusState};
pub use common::{BusConfiguration, Error, I2cConfig, I2cConfigBuilder, I2cSpeed, PullupPolicy};
pub use i2c_controller::I2cController;
pub use status::{BusStatus, Phase, StatusLatch, StatusSource, TWI_STATUS};
pub use timeout::TWI_TIMEOUT;
pub use traits::{RegisterAccess, TwiHardware};
