//! Boot firmware for an ATmega128 driving an iCE40 FPGA with PSRAM behind it.
//!
//! At power-up the resources on the external SPI flash are used to load
//! the FPGA, optionally preloading the PSRAM first through an SPI
//! pass-through design.
#![cfg_attr(not(test), no_std)]

pub mod boot;
pub mod config;
pub mod drivers;
pub mod loader;
pub mod logger;
pub mod storage;
pub mod streamer;

#[cfg(all(target_arch = "avr", feature = "atmega128"))]
pub mod hal;

#[cfg(test)]
mod testing;

pub use boot::{BootReport, BootSequencer, FpgaOutcome};
pub use loader::{ConfigChannel, ConfigLoader, ConfigResult, Rejection, RetryBudget};
pub use logger::{BootEvent, ConsoleLogger, EventSink, Level};
pub use storage::{FlashVolume, Storage, StorageError};
pub use streamer::{MemoryChannel, MemoryStreamer, StreamOutcome, WriteError};
