//! Read-only resource volume on external flash
//!
//! Layout, starting at the volume base:
//!
//! ```text
//! 0x00  magic "ICEV"
//! 0x04  entry count (u16 LE)
//! 0x06  reserved
//! 0x08  entries, 32 bytes each:
//!         name    [u8; 24], NUL padded
//!         offset  u32 LE, relative to the volume base
//!         length  u32 LE
//! ```

use embedded_storage::ReadStorage;

use super::{Storage, StorageError};
use crate::config::MAX_VOLUME_ENTRIES;

const VOLUME_MAGIC: [u8; 4] = *b"ICEV";
const HEADER_LEN: u32 = 8;
const ENTRY_LEN: u32 = 32;
const NAME_LEN: usize = 24;

pub struct FlashVolume<F> {
    flash: F,
    base: u32,
    entries: u16,
}

#[derive(Debug)]
pub struct VolumeHandle {
    offset: u32,
    len: u32,
    pos: u32,
}

struct Entry {
    offset: u32,
    len: u32,
}

impl<F: ReadStorage> FlashVolume<F> {
    /// Validate the directory header at `base`
    pub fn mount(mut flash: F, base: u32) -> Result<Self, StorageError> {
        let mut header = [0u8; HEADER_LEN as usize];
        flash
            .read(base, &mut header)
            .map_err(|_| StorageError::Device)?;

        if header[..4] != VOLUME_MAGIC {
            return Err(StorageError::BadVolume);
        }

        let entries = u16::from_le_bytes([header[4], header[5]]);
        if entries > MAX_VOLUME_ENTRIES {
            return Err(StorageError::BadVolume);
        }

        Ok(Self {
            flash,
            base,
            entries,
        })
    }

    pub fn entries(&self) -> u16 {
        self.entries
    }

    pub fn release(self) -> F {
        self.flash
    }

    fn lookup(&mut self, name: &str) -> Result<Entry, StorageError> {
        let name = name.as_bytes();
        if name.is_empty() || name.len() > NAME_LEN {
            return Err(StorageError::NotFound);
        }

        for index in 0..self.entries as u32 {
            let mut raw = [0u8; ENTRY_LEN as usize];
            let at = self.base + HEADER_LEN + index * ENTRY_LEN;
            self.flash
                .read(at, &mut raw)
                .map_err(|_| StorageError::Device)?;

            let stored = &raw[..NAME_LEN];
            let stored_len = stored.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
            if &stored[..stored_len] != name {
                continue;
            }

            let offset = u32::from_le_bytes([raw[24], raw[25], raw[26], raw[27]]);
            let len = u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]);

            let start = self
                .base
                .checked_add(offset)
                .ok_or(StorageError::BadVolume)?;
            if len > 0 {
                // capacity() is a usize and saturates on 16-bit targets,
                // so let the device range-check the last byte instead
                let last = start.checked_add(len - 1).ok_or(StorageError::BadVolume)?;
                self.flash
                    .read(last, &mut [0u8; 1])
                    .map_err(|_| StorageError::BadVolume)?;
            }

            return Ok(Entry { offset: start, len });
        }

        Err(StorageError::NotFound)
    }
}

impl<F: ReadStorage> Storage for FlashVolume<F> {
    type Handle = VolumeHandle;

    fn size_of(&mut self, name: &str) -> Result<u32, StorageError> {
        self.lookup(name).map(|entry| entry.len)
    }

    fn open(&mut self, name: &str) -> Result<VolumeHandle, StorageError> {
        let entry = self.lookup(name)?;
        Ok(VolumeHandle {
            offset: entry.offset,
            len: entry.len,
            pos: 0,
        })
    }

    fn read(&mut self, handle: &mut VolumeHandle, buf: &mut [u8]) -> Result<usize, StorageError> {
        let left = handle.len - handle.pos;
        let n = left.min(u32::try_from(buf.len()).unwrap_or(u32::MAX)) as usize;
        if n == 0 {
            return Ok(0);
        }

        self.flash
            .read(handle.offset + handle.pos, &mut buf[..n])
            .map_err(|_| StorageError::Device)?;
        handle.pos += n as u32;
        Ok(n)
    }

    fn close(&mut self, _handle: VolumeHandle) {}
}
