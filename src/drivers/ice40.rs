//! Lattice iCE40 SPI slave configuration, plus PSRAM writes through the
//! pass-through design.
//!
//! The pass-through design ties the configuration SPI pins, SS included,
//! straight to the PSRAM, so both ports share one bus and one select line.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Write;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::config::{
    ICE_CLEAR_US, ICE_DONE_POLLS, ICE_DONE_POLL_US, ICE_RESET_PULSE_US, PSRAM_PAGE_SIZE, PSRAM_SIZE,
};
use crate::loader::{ConfigChannel, Rejection};
use crate::streamer::{MemoryChannel, WriteError};

const PSRAM_WRITE: u8 = 0x02;

const fn status(code: u8) -> Rejection {
    match Rejection::new(code) {
        Some(rejection) => rejection,
        None => panic!("status 0 means accepted"),
    }
}

/// CDONE still high after CRESET
pub const CDONE_STUCK: Rejection = status(1);
/// CDONE never rose after the bitstream
pub const CDONE_TIMEOUT: Rejection = status(2);
/// SPI or GPIO failure
pub const BUS_FAULT: Rejection = status(3);

// 104 clocks after the image, then 56 more to release the user I/O
const ZEROS: [u8; 13] = [0; 13];
const WAKE_BYTES: usize = 13;
const START_BYTES: usize = 7;

pub struct Ice40<SPI, SS, RST, DONE, D> {
    spi: SPI,
    ss: SS,
    creset: RST,
    cdone: DONE,
    delay: D,
    burst: Option<Burst>,
}

/// Open PSRAM write: next byte address and end of the declared range
#[derive(Clone, Copy)]
struct Burst {
    next: u32,
    end: u32,
}

impl<SPI, SS, RST, DONE, D> Ice40<SPI, SS, RST, DONE, D>
where
    SPI: Write<u8>,
    SS: OutputPin,
    RST: OutputPin,
    DONE: InputPin,
    D: DelayUs<u32>,
{
    pub fn new(spi: SPI, ss: SS, creset: RST, cdone: DONE, delay: D) -> Self {
        Self {
            spi,
            ss,
            creset,
            cdone,
            delay,
            burst: None,
        }
    }

    fn dummy_clocks(&mut self, bytes: usize) -> Result<(), Rejection> {
        self.spi.write(&ZEROS[..bytes]).map_err(|_| BUS_FAULT)
    }

    fn try_configure(&mut self, image: &[u8]) -> Result<(), Rejection> {
        // SS low while CRESET rises selects SPI slave mode
        self.ss.set_low().map_err(|_| BUS_FAULT)?;
        self.creset.set_low().map_err(|_| BUS_FAULT)?;
        self.delay.delay_us(ICE_RESET_PULSE_US);
        self.creset.set_high().map_err(|_| BUS_FAULT)?;
        self.delay.delay_us(ICE_CLEAR_US);

        if self.cdone.is_high().map_err(|_| BUS_FAULT)? {
            return Err(CDONE_STUCK);
        }

        self.ss.set_high().map_err(|_| BUS_FAULT)?;
        self.dummy_clocks(1)?;
        self.ss.set_low().map_err(|_| BUS_FAULT)?;
        self.spi.write(image).map_err(|_| BUS_FAULT)?;
        self.ss.set_high().map_err(|_| BUS_FAULT)?;
        self.dummy_clocks(WAKE_BYTES)?;

        let mut polls = 0;
        while !self.cdone.is_high().map_err(|_| BUS_FAULT)? {
            polls += 1;
            if polls >= ICE_DONE_POLLS {
                return Err(CDONE_TIMEOUT);
            }
            self.delay.delay_us(ICE_DONE_POLL_US);
        }

        self.dummy_clocks(START_BYTES)
    }

    fn psram_burst(&mut self, address: u32, data: &[u8]) -> Result<(), WriteError> {
        let command = [PSRAM_WRITE, (address >> 16) as u8, (address >> 8) as u8, address as u8];

        self.ss.set_low().map_err(|_| WriteError::Bus)?;
        let result = self
            .spi
            .write(&command)
            .and_then(|()| self.spi.write(data));
        self.ss.set_high().map_err(|_| WriteError::Bus)?;
        result.map_err(|_| WriteError::Bus)
    }
}

impl<SPI, SS, RST, DONE, D> ConfigChannel for Ice40<SPI, SS, RST, DONE, D>
where
    SPI: Write<u8>,
    SS: OutputPin,
    RST: OutputPin,
    DONE: InputPin,
    D: DelayUs<u32>,
{
    fn configure(&mut self, image: &[u8]) -> Result<(), Rejection> {
        let result = self.try_configure(image);
        if result.is_err() {
            self.ss.set_high().ok();
        }
        result
    }
}

impl<SPI, SS, RST, DONE, D> MemoryChannel for Ice40<SPI, SS, RST, DONE, D>
where
    SPI: Write<u8>,
    SS: OutputPin,
    RST: OutputPin,
    DONE: InputPin,
    D: DelayUs<u32>,
{
    fn begin(&mut self, address: u32, len: u32) -> Result<(), WriteError> {
        let end = address as u64 + len as u64;
        if end > PSRAM_SIZE as u64 {
            return Err(WriteError::OutOfRange);
        }

        self.burst = Some(Burst {
            next: address,
            end: end as u32,
        });
        Ok(())
    }

    /// Bursts never cross a PSRAM page, the part wraps inside a page
    fn push(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let Burst { mut next, end } = self.burst.ok_or(WriteError::OutOfRange)?;
        if next as u64 + data.len() as u64 > end as u64 {
            return Err(WriteError::OutOfRange);
        }

        let mut rest = data;
        while !rest.is_empty() {
            let page_left = (PSRAM_PAGE_SIZE - next % PSRAM_PAGE_SIZE) as usize;
            let (burst, tail) = rest.split_at(page_left.min(rest.len()));
            self.psram_burst(next, burst)?;
            next += burst.len() as u32;
            self.burst = Some(Burst { next, end });
            rest = tail;
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), WriteError> {
        self.burst = None;
        Ok(())
    }
}
