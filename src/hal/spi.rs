//! SPI master on the hardware SPI block

use avr_device::atmega128a::SPI;
use core::convert::Infallible;
use core::marker::PhantomData;
use embedded_hal::spi::FullDuplex;

const SPIF: u8 = 0x80;
const SPE_MSTR: u8 = 0x50;
const SPI2X: u8 = 0x01;

/// SCK divider, `Div2` uses the double speed bit
#[derive(Clone, Copy)]
pub enum SpiPrescaler {
    Div2,
    Div4,
    Div16,
    Div64,
}

/// Mode 0, MSB first. SS, SCK and MOSI must already be outputs.
pub struct Spi {
    _spi: PhantomData<SPI>,
}

impl Spi {
    pub fn new(prescaler: SpiPrescaler) -> Self {
        let (spr, double) = match prescaler {
            SpiPrescaler::Div2 => (0, true),
            SpiPrescaler::Div4 => (0, false),
            SpiPrescaler::Div16 => (1, false),
            SpiPrescaler::Div64 => (2, false),
        };

        unsafe {
            let p = SPI::ptr();
            (*p).spcr.write(|w| w.bits(SPE_MSTR | spr));
            (*p).spsr.write(|w| w.bits(if double { SPI2X } else { 0 }));
        }

        Self { _spi: PhantomData }
    }

    /// Second handle on the same bus. Clock and mode stay as configured
    /// by [`Spi::new`]; each device still needs its own chip select.
    pub fn share(&self) -> Spi {
        Self { _spi: PhantomData }
    }
}

impl FullDuplex<u8> for Spi {
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Infallible> {
        unsafe {
            let p = SPI::ptr();
            if (*p).spsr.read().bits() & SPIF == 0 {
                return Err(nb::Error::WouldBlock);
            }
            Ok((*p).spdr.read().bits())
        }
    }

    fn send(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        unsafe {
            (*SPI::ptr()).spdr.write(|w| w.bits(byte));
        }
        Ok(())
    }
}

impl embedded_hal::blocking::spi::transfer::Default<u8> for Spi {}
impl embedded_hal::blocking::spi::write::Default<u8> for Spi {}
