// Licensed under the Apache-2.0 license

//! Logging seam shared by the drivers.
//!
//! Drivers take a `Logger` type parameter defaulting to [`NoOpLogger`], so a
//! release build pays nothing for diagnostics. Messages are passed as
//! `fmt::Arguments` and never allocate.

use core::fmt;

pub trait Logger {
    fn debug(&mut self, args: fmt::Arguments<'_>);
    fn error(&mut self, args: fmt::Arguments<'_>);
}

/// Discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _args: fmt::Arguments<'_>) {}
    fn error(&mut self, _args: fmt::Arguments<'_>) {}
}

impl<L: Logger + ?Sized> Logger for &mut L {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        (**self).debug(args);
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        (**self).error(args);
    }
}

/// Writes `[level] message` lines to a serial port.
///
/// Write failures are dropped: a logger must never turn a diagnostic into a
/// new error path for the driver that called it.
pub struct UartLogger<W: embedded_io::Write> {
    writer: W,
}

impl<W: embedded_io::Write> UartLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, level: &str, args: fmt::Arguments<'_>) {
        let _ = self.writer.write_fmt(format_args!("[{level}] {args}\r\n"));
    }
}

impl<W: embedded_io::Write> Logger for UartLogger<W> {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.line("debug", args);
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.line("error", args);
    }
}
