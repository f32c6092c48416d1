// Licensed under the Apache-2.0 license

use core::fmt::Write as _;

use embedded_io::Write;
use heapless::String;

use crate::i2c::common::Error;
use crate::i2c::traits::RegisterAccess;
use crate::rtc::{DateTime, Ds3231};

/// Timestamp written by the demo, 2023/07/16 20:46:50.
pub const DEMO_TIME: DateTime = DateTime {
    year: 23,
    month: 7,
    date: 16,
    weekday: 7,
    hours: 20,
    minutes: 46,
    seconds: 50,
};

type Line = String<32>;

/// Sets the clock to [`DEMO_TIME`] and reads it back.
///
/// Returns whether the read-back matched. Console output is best effort.
pub fn run_rtc_tests<W, B>(uart: &mut W, rtc: &mut Ds3231<B>) -> bool
where
    W: Write,
    B: RegisterAccess<Error = Error>,
{
    let _ = uart.write_all(b"\r\n=== DS3231 Round Trip ===\r\n");

    let written = test_set_time(uart, rtc);
    let matched = test_read_time(uart, rtc);
    let passed = written && matched;

    let _ = uart.write_all(if passed {
        b"\r\n=== RTC Tests PASSED ===\r\n"
    } else {
        b"\r\n=== RTC Tests FAILED ===\r\n"
    });
    passed
}

fn test_set_time<W: Write, B: RegisterAccess<Error = Error>>(
    uart: &mut W,
    rtc: &mut Ds3231<B>,
) -> bool {
    let _ = uart.write_all(b"Writing demo time... ");
    match rtc.set_time(&DEMO_TIME) {
        Ok(()) => {
            let _ = uart.write_all(b"PASSED\r\n");
            true
        }
        Err(err) => {
            report_error(uart, line!(), err);
            false
        }
    }
}

fn test_read_time<W: Write, B: RegisterAccess<Error = Error>>(
    uart: &mut W,
    rtc: &mut Ds3231<B>,
) -> bool {
    let _ = uart.write_all(b"Reading time back... ");
    match rtc.read_time() {
        Ok(time) => {
            let mut line = Line::new();
            let _ = write!(line, "\r{time}\n\n");
            let _ = uart.write_all(line.as_bytes());
            time == DEMO_TIME
        }
        Err(err) => {
            report_error(uart, line!(), err);
            false
        }
    }
}

fn report_error<W: Write>(uart: &mut W, line: u32, err: Error) {
    let mut text = Line::new();
    let _ = write!(text, "{line} error {}\r\n\n", err.code());
    let _ = uart.write_all(text.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NoOpLogger;
    use crate::i2c::common::I2cConfigBuilder;
    use crate::i2c::i2c_controller::I2cController;
    use crate::i2c::mock::{Capture, MockPullups, SimulatedTwi};
    use crate::i2c::status::StatusLatch;
    use crate::rtc::DS3231_ADDRESS;

    fn rtc(
        latch: &StatusLatch,
    ) -> Ds3231<I2cController<SimulatedTwi<'_>, MockPullups, &StatusLatch, NoOpLogger>> {
        let config = I2cConfigBuilder::new().timeout(40).build();
        Ds3231::new(I2cController::with_parts(
            SimulatedTwi::new(latch, DS3231_ADDRESS),
            MockPullups::default(),
            latch,
            NoOpLogger,
            config,
        ))
    }

    #[test]
    fn test_round_trip_reports_time_and_passes() {
        let latch = StatusLatch::new();
        let mut rtc = rtc(&latch);
        let mut uart = Capture::default();

        assert!(run_rtc_tests(&mut uart, &mut rtc));

        let text = uart.text();
        assert!(text.contains("Writing demo time... PASSED"));
        assert!(text.contains("\r2023/07/16 20:46:50\n\n"));
        assert!(text.ends_with("=== RTC Tests PASSED ===\r\n"));
    }

    #[test]
    fn test_missing_device_prints_error_code() {
        let latch = StatusLatch::new();
        let mut rtc = rtc(&latch);
        rtc.bus_mut().bus_mut().hardware_mut().nack_address = true;
        let mut uart = Capture::default();

        assert!(!run_rtc_tests(&mut uart, &mut rtc));

        let text = uart.text();
        assert_eq!(text.matches(" error 3\r\n\n").count(), 2);
        assert!(text.ends_with("=== RTC Tests FAILED ===\r\n"));
    }

    #[test]
    fn test_mismatch_fails() {
        let latch = StatusLatch::new();
        let mut rtc = rtc(&latch);
        // Device accepts the register pointer but drops the time bytes.
        rtc.bus_mut().bus_mut().hardware_mut().nack_data_after = Some(1);
        let mut uart = Capture::default();

        assert!(!run_rtc_tests(&mut uart, &mut rtc));
        assert!(uart.text().contains("\r2000/00/00 00:00:00\n\n"));
    }
}
