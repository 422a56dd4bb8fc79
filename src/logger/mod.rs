//! Boot event logging
//!
//! Boot code reports what it does as [`BootEvent`]s to an [`EventSink`].
//! [`ConsoleLogger`] renders them as text lines on any `ufmt` writer,
//! typically the debug UART.

use ufmt::{uDisplay, uWrite, uwrite, Formatter};

use crate::storage::StorageError;
use crate::streamer::WriteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    fn prefix(&self) -> &'static str {
        match self {
            Level::Debug => "D",
            Level::Info => "I",
            Level::Warn => "W",
            Level::Error => "E",
        }
    }
}

/// Console threshold for this build
#[cfg(feature = "debug")]
pub const DEFAULT_LEVEL: Level = Level::Debug;
#[cfg(not(feature = "debug"))]
pub const DEFAULT_LEVEL: Level = Level::Info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootEvent<'a> {
    BootStart { version: &'a str },
    BootDone { fpga_up: bool, psram_written: u32 },
    VolumeUnavailable { error: StorageError },

    ConfigRejected { attempt: u16, status: u8 },
    ConfigAccepted { attempts: u16 },
    ConfigExhausted { attempts: u16 },

    FpgaLoad { name: &'a str, len: u32 },
    FpgaImageMissing { name: &'a str },
    FpgaImageUnreadable { name: &'a str, error: StorageError },

    StreamStart { name: &'a str },
    StreamMissing { name: &'a str, error: StorageError },
    StreamEmpty { name: &'a str, len: u32 },
    PassthroughUnavailable,
    PassthroughFailed { name: &'a str },
    StreamOpenFailed { name: &'a str, error: StorageError },
    StreamHeader { name: &'a str, address: u32, len: u32 },
    ChunkWritten { address: u32, len: u32 },
    HeaderShort { name: &'a str, actual: u32 },
    ShortRead { name: &'a str, address: u32, requested: u32, actual: u32 },
    WriteFailed { address: u32, len: u32, error: WriteError },
    StreamComplete { name: &'a str, written: u32 },
    StreamFailed { name: &'a str, written: u32 },
}

impl BootEvent<'_> {
    pub fn level(&self) -> Level {
        match self {
            BootEvent::ChunkWritten { .. } => Level::Debug,
            BootEvent::ConfigRejected { .. }
            | BootEvent::ConfigExhausted { .. }
            | BootEvent::FpgaImageUnreadable { .. }
            | BootEvent::PassthroughUnavailable
            | BootEvent::PassthroughFailed { .. } => Level::Warn,
            BootEvent::VolumeUnavailable { .. }
            | BootEvent::HeaderShort { .. }
            | BootEvent::ShortRead { .. }
            | BootEvent::WriteFailed { .. }
            | BootEvent::StreamFailed { .. } => Level::Error,
            _ => Level::Info,
        }
    }

    /// Subsystem shown in the log line
    pub fn tag(&self) -> &'static str {
        match self {
            BootEvent::BootStart { .. }
            | BootEvent::BootDone { .. }
            | BootEvent::VolumeUnavailable { .. } => "main",
            BootEvent::ConfigRejected { .. }
            | BootEvent::ConfigAccepted { .. }
            | BootEvent::ConfigExhausted { .. }
            | BootEvent::FpgaLoad { .. }
            | BootEvent::FpgaImageMissing { .. }
            | BootEvent::FpgaImageUnreadable { .. } => "fpga",
            _ => "psram",
        }
    }
}

/// Receiver of boot events. Advisory only: sinks cannot fail the caller.
pub trait EventSink {
    fn record(&mut self, event: &BootEvent<'_>);
}

impl EventSink for () {
    fn record(&mut self, _event: &BootEvent<'_>) {}
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn record(&mut self, event: &BootEvent<'_>) {
        (**self).record(event)
    }
}

/// `0x`-prefixed, zero padded 32-bit hex
pub struct Hex32(pub u32);

impl uDisplay for Hex32 {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        const HEX_CHARS: [u8; 16] = *b"0123456789abcdef";
        let mut buf = *b"0x00000000";
        for (i, digit) in buf[2..].iter_mut().enumerate() {
            let nibble = (self.0 >> ((7 - i) * 4)) & 0xF;
            *digit = HEX_CHARS[nibble as usize];
        }
        f.write_str(core::str::from_utf8(&buf).unwrap_or("0x????????"))
    }
}

/// Text logger on top of a `ufmt` writer
pub struct ConsoleLogger<W> {
    out: W,
    min_level: Level,
    warnings: u16,
    errors: u16,
}

impl<W: uWrite> ConsoleLogger<W> {
    pub fn new(out: W, min_level: Level) -> Self {
        Self {
            out,
            min_level,
            warnings: 0,
            errors: 0,
        }
    }

    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    pub fn errors(&self) -> u16 {
        self.errors
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, event: &BootEvent<'_>) -> Result<(), W::Error> {
        let out = &mut self.out;
        uwrite!(out, "{} ({}) ", event.level().prefix(), event.tag())?;

        match *event {
            BootEvent::BootStart { version } => uwrite!(out, "firmware {} starting", version),
            BootEvent::BootDone { fpga_up, psram_written } => uwrite!(
                out,
                "boot done: fpga {}, psram {} bytes",
                if fpga_up { "up" } else { "down" },
                psram_written
            ),
            BootEvent::VolumeUnavailable { error } => {
                uwrite!(out, "resource volume unavailable: {}", error.as_str())
            }
            BootEvent::ConfigRejected { attempt, status } => {
                uwrite!(out, "configure attempt {} failed, status = {}", attempt, status)
            }
            BootEvent::ConfigAccepted { attempts } => {
                uwrite!(out, "configured OK after {} attempt(s)", attempts)
            }
            BootEvent::ConfigExhausted { attempts } => {
                uwrite!(out, "configure failed {} times, giving up", attempts)
            }
            BootEvent::FpgaLoad { name, len } => {
                uwrite!(out, "configuring from {} ({} bytes)", name, len)
            }
            BootEvent::FpgaImageMissing { name } => uwrite!(out, "image {} not found", name),
            BootEvent::FpgaImageUnreadable { name, error } => {
                uwrite!(out, "image {} unreadable: {}", name, error.as_str())
            }
            BootEvent::StreamStart { name } => uwrite!(out, "preloading from {}", name),
            BootEvent::StreamMissing { name, error } => {
                uwrite!(out, "{} not available: {}", name, error.as_str())
            }
            BootEvent::StreamEmpty { name, len } => {
                uwrite!(out, "{} is empty ({} bytes)", name, len)
            }
            BootEvent::PassthroughUnavailable => uwrite!(out, "pass-through image unavailable"),
            BootEvent::PassthroughFailed { name } => {
                uwrite!(out, "pass-through not configured, skipping {}", name)
            }
            BootEvent::StreamOpenFailed { name, error } => {
                uwrite!(out, "{} open error: {}", name, error.as_str())
            }
            BootEvent::StreamHeader { name, address, len } => uwrite!(
                out,
                "{}: addr {}, len {}",
                name,
                Hex32(address),
                Hex32(len)
            ),
            BootEvent::ChunkWritten { address, len } => {
                uwrite!(out, "  chunk @ addr {}, len {}", Hex32(address), Hex32(len))
            }
            BootEvent::HeaderShort { name, actual } => {
                uwrite!(out, "{}: address header cut short, {} of 4 bytes", name, actual)
            }
            BootEvent::ShortRead {
                name,
                address,
                requested,
                actual,
            } => uwrite!(
                out,
                "{}: failed reading {} for addr {}, actual = {}",
                name,
                requested,
                Hex32(address),
                actual
            ),
            BootEvent::WriteFailed { address, len, error } => uwrite!(
                out,
                "write @ addr {}, len {} failed: {}",
                Hex32(address),
                Hex32(len),
                error.as_str()
            ),
            BootEvent::StreamComplete { name, written } => {
                uwrite!(out, "{} loaded OK, {} bytes", name, written)
            }
            BootEvent::StreamFailed { name, written } => {
                uwrite!(out, "{} failed after {} bytes", name, written)
            }
        }?;

        out.write_str("\r\n")
    }
}

impl<W: uWrite> EventSink for ConsoleLogger<W> {
    fn record(&mut self, event: &BootEvent<'_>) {
        let level = event.level();
        match level {
            Level::Warn => self.warnings = self.warnings.saturating_add(1),
            Level::Error => self.errors = self.errors.saturating_add(1),
            _ => {}
        }

        if level >= self.min_level {
            // Logging is best effort
            self.render(event).ok();
        }
    }
}
