//! External Flash Memory Driver (W25Q128)
//!
//! Read-only access for the boot volume; programming happens off-board.

use embedded_hal::blocking::spi::{Transfer, Write};
use embedded_hal::digital::v2::OutputPin;
use embedded_storage::ReadStorage;

const READ_DATA: u8 = 0x03;
const POWER_DOWN: u8 = 0xB9;
const RELEASE_POWER_DOWN: u8 = 0xAB;
const JEDEC_ID: u8 = 0x9F;

const EXPECTED_ID: [u8; 3] = [0xEF, 0x40, 0x18];
const CAPACITY: u32 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// SPI transfer or chip select failed
    Bus,
    WrongId([u8; 3]),
    OutOfRange,
}

pub struct Flash<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS, E> Flash<SPI, CS>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
    CS: OutputPin,
{
    pub fn new(spi: SPI, cs: CS) -> Result<Self, FlashError> {
        let mut flash = Self { spi, cs };
        flash.init()?;
        Ok(flash)
    }

    fn init(&mut self) -> Result<(), FlashError> {
        self.cs.set_high().map_err(|_| FlashError::Bus)?;
        // a soft reset can leave the part powered down
        self.release_power_down()?;

        let id = self.read_jedec_id()?;
        if id != EXPECTED_ID {
            return Err(FlashError::WrongId(id));
        }

        Ok(())
    }

    pub fn read_jedec_id(&mut self) -> Result<[u8; 3], FlashError> {
        let mut frame = [JEDEC_ID, 0x00, 0x00, 0x00];
        self.select(|spi| spi.transfer(&mut frame).map(|_| ()))?;
        Ok([frame[1], frame[2], frame[3]])
    }

    pub fn read(&mut self, addr: u32, buffer: &mut [u8]) -> Result<(), FlashError> {
        if addr as u64 + buffer.len() as u64 > CAPACITY as u64 {
            return Err(FlashError::OutOfRange);
        }

        let command = [READ_DATA, (addr >> 16) as u8, (addr >> 8) as u8, addr as u8];
        buffer.fill(0x00);
        self.select(|spi| {
            spi.write(&command)?;
            spi.transfer(buffer).map(|_| ())
        })
    }

    pub fn power_down(&mut self) -> Result<(), FlashError> {
        self.select(|spi| spi.write(&[POWER_DOWN]))
    }

    pub fn release_power_down(&mut self) -> Result<(), FlashError> {
        self.select(|spi| spi.write(&[RELEASE_POWER_DOWN]))
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    /// Run one command with chip select held low
    fn select<F>(&mut self, op: F) -> Result<(), FlashError>
    where
        F: FnOnce(&mut SPI) -> Result<(), E>,
    {
        self.cs.set_low().map_err(|_| FlashError::Bus)?;
        let result = op(&mut self.spi);
        self.cs.set_high().map_err(|_| FlashError::Bus)?;
        result.map_err(|_| FlashError::Bus)
    }
}

impl<SPI, CS, E> ReadStorage for Flash<SPI, CS>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
    CS: OutputPin,
{
    type Error = FlashError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), FlashError> {
        Flash::read(self, offset, bytes)
    }

    /// Saturates where usize cannot hold 16 MiB
    fn capacity(&self) -> usize {
        usize::try_from(CAPACITY).unwrap_or(usize::MAX)
    }
}
