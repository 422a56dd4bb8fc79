//! Register level drivers for the ATmega128 peripherals used at boot
pub mod gpio;
pub mod spi;
pub mod timer;
pub mod uart;

pub use gpio::{Input, Output, Pin};
pub use gpio::board;
pub use spi::{Spi, SpiPrescaler};
pub use timer::Delay;
pub use uart::Uart;
