// Licensed under the Apache-2.0 license

//! Bounded busy-wait used by every bus phase.
//!
//! The ceiling counts polls, not time. It is the same for every phase and does
//! not follow the configured bus speed, so the wall-clock bound it gives is
//! only approximate: at 16 MHz, 1600 polls comfortably cover one byte at
//! 100 kHz.

use crate::i2c::common::Error;
use crate::i2c::status::{BusStatus, Phase, StatusSource};

/// Default poll ceiling for one phase.
pub const TWI_TIMEOUT: u16 = 1600;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimedOut;

/// Calls `poll` until it returns true, at most `ceiling` times.
///
/// Returns the number of polls it took.
///
/// # Errors
///
/// Returns `TimedOut` once `ceiling` polls have all returned false.
pub fn bounded_retry<F>(ceiling: u16, mut poll: F) -> Result<u16, TimedOut>
where
    F: FnMut() -> bool,
{
    for attempt in 1..=ceiling {
        if poll() {
            return Ok(attempt);
        }
        core::hint::spin_loop();
    }
    Err(TimedOut)
}

/// A phase whose expected status never showed up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhaseTimeout {
    pub phase: Phase,
    /// Last status sampled, `None` if the ceiling allowed no sample at all.
    pub last_seen: Option<BusStatus>,
}

impl PhaseTimeout {
    #[must_use]
    pub const fn error(&self) -> Error {
        self.phase.error()
    }
}

/// Waits for the status `phase` expects, posted after epoch `armed`.
///
/// Takes exactly `ceiling` samples before giving up and never samples again
/// afterwards.
///
/// # Errors
///
/// Returns the phase and the last status seen once the ceiling is exhausted.
pub fn wait_for<S>(source: &S, phase: Phase, armed: u8, ceiling: u16) -> Result<(), PhaseTimeout>
where
    S: StatusSource + ?Sized,
{
    let expected = phase.expected();
    let mut last_seen = None;
    let outcome = bounded_retry(ceiling, || {
        let sample = source.sample();
        last_seen = Some(sample.status);
        sample.epoch != armed && sample.status == expected
    });

    match outcome {
        Ok(_) => Ok(()),
        Err(TimedOut) => Err(PhaseTimeout { phase, last_seen }),
    }
}
