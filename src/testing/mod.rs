//! Host-side fakes for the boot capabilities

use embedded_storage::ReadStorage;

use crate::loader::{ConfigChannel, Rejection};
use crate::logger::{BootEvent, EventSink, Level};
use crate::storage::{Storage, StorageError};
use crate::streamer::{MemoryChannel, WriteError};

/// FPGA stand-in: scripted configuration results and a recording memory port
#[derive(Default)]
pub struct FakeDevice {
    rejections: u16,
    status: u8,
    images: Vec<usize>,
    writes: Vec<(u32, Vec<u8>)>,
    open: Option<u32>,
    write_calls: usize,
    pushes: usize,
    fail_write: Option<(usize, WriteError)>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the first `count` configure calls with `status`
    pub fn reject_first(mut self, count: u16, status: u8) -> Self {
        self.rejections = count;
        self.status = status;
        self
    }

    /// Refuse the addressed write with index `call` (0-based)
    pub fn fail_write(mut self, call: usize, error: WriteError) -> Self {
        self.fail_write = Some((call, error));
        self
    }

    pub fn configure_calls(&self) -> u16 {
        self.images.len() as u16
    }

    /// Length of every image offered to the configuration port
    pub fn images(&self) -> &[usize] {
        &self.images
    }

    /// Addressed writes attempted, refused ones included
    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    pub fn pushes(&self) -> usize {
        self.pushes
    }

    /// Writes begun but never ended
    pub fn open_writes(&self) -> usize {
        self.open.is_some() as usize
    }

    /// Accepted writes in order, with the bytes pushed into each
    pub fn writes(&self) -> &[(u32, Vec<u8>)] {
        &self.writes
    }

    pub fn memory_bytes(&self) -> Vec<u8> {
        self.writes.iter().flat_map(|(_, data)| data.iter().copied()).collect()
    }
}

impl ConfigChannel for FakeDevice {
    fn configure(&mut self, image: &[u8]) -> Result<(), Rejection> {
        self.images.push(image.len());
        if self.images.len() as u32 <= self.rejections as u32 {
            Err(Rejection::new(self.status.max(1)).unwrap())
        } else {
            Ok(())
        }
    }
}

impl MemoryChannel for FakeDevice {
    fn begin(&mut self, address: u32, len: u32) -> Result<(), WriteError> {
        assert!(self.open.is_none(), "write begun twice");
        let call = self.write_calls;
        self.write_calls += 1;
        match self.fail_write {
            Some((at, error)) if at == call => Err(error),
            _ => {
                self.writes.push((address, Vec::new()));
                self.open = Some(len);
                Ok(())
            }
        }
    }

    fn push(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let declared = self.open.expect("push outside a write");
        let (_, bytes) = self.writes.last_mut().expect("no write recorded");
        assert!(bytes.len() + data.len() <= declared as usize, "push past declared length");
        bytes.extend_from_slice(data);
        self.pushes += 1;
        Ok(())
    }

    fn end(&mut self) -> Result<(), WriteError> {
        self.open = None;
        Ok(())
    }
}

/// In-memory resource store with fault injection
#[derive(Default)]
pub struct MemStorage {
    resources: Vec<(String, Vec<u8>)>,
    short_after: Option<usize>,
    max_read: Option<usize>,
    fail_open: bool,
    opens: usize,
    open_handles: usize,
}

#[derive(Debug)]
pub struct MemHandle {
    index: usize,
    pos: usize,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, data: &[u8]) -> Self {
        self.resources.push((String::from(name), data.to_vec()));
        self
    }

    /// Reads see no data at or past byte offset `offset`
    pub fn short_after(mut self, offset: usize) -> Self {
        self.short_after = Some(offset);
        self
    }

    /// Cap every read call at `len` bytes
    pub fn max_read(mut self, len: usize) -> Self {
        self.max_read = Some(len);
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles
    }

    fn find(&self, name: &str) -> Result<usize, StorageError> {
        self.resources
            .iter()
            .position(|(stored, _)| stored == name)
            .ok_or(StorageError::NotFound)
    }
}

impl Storage for MemStorage {
    type Handle = MemHandle;

    fn size_of(&mut self, name: &str) -> Result<u32, StorageError> {
        let index = self.find(name)?;
        Ok(self.resources[index].1.len() as u32)
    }

    fn open(&mut self, name: &str) -> Result<MemHandle, StorageError> {
        if self.fail_open {
            return Err(StorageError::Device);
        }
        let index = self.find(name)?;
        self.opens += 1;
        self.open_handles += 1;
        Ok(MemHandle { index, pos: 0 })
    }

    fn read(&mut self, handle: &mut MemHandle, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = &self.resources[handle.index].1;
        let end = self.short_after.map_or(data.len(), |limit| limit.min(data.len()));
        let available = end.saturating_sub(handle.pos);
        let n = available
            .min(buf.len())
            .min(self.max_read.unwrap_or(usize::MAX));
        buf[..n].copy_from_slice(&data[handle.pos..handle.pos + n]);
        handle.pos += n;
        Ok(n)
    }

    fn close(&mut self, _handle: MemHandle) {
        self.open_handles -= 1;
    }
}

/// Flat byte array posing as a NOR flash
pub struct RamFlash {
    data: Vec<u8>,
}

impl RamFlash {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ReadStorage for RamFlash {
    type Error = ();

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), ()> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            return Err(());
        }
        bytes.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// Build a resource volume holding `files`, directory first
pub fn volume_image(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(b"ICEV");
    raw.extend_from_slice(&(files.len() as u16).to_le_bytes());
    raw.extend_from_slice(&[0, 0]);

    let mut offset = 8 + 32 * files.len() as u32;
    for (name, data) in files {
        let mut entry = [0u8; 32];
        entry[..name.len()].copy_from_slice(name.as_bytes());
        entry[24..28].copy_from_slice(&offset.to_le_bytes());
        entry[28..32].copy_from_slice(&(data.len() as u32).to_le_bytes());
        raw.extend_from_slice(&entry);
        offset += data.len() as u32;
    }
    for (_, data) in files {
        raw.extend_from_slice(data);
    }
    raw
}

/// Address header followed by `payload_len` patterned bytes
pub fn psram_image(address: u32, payload_len: usize) -> Vec<u8> {
    let mut image = address.to_le_bytes().to_vec();
    image.extend((0..payload_len).map(|i| (i % 251) as u8));
    image
}

/// Keeps every event as its `Debug` text
#[derive(Default)]
pub struct Recorder {
    events: Vec<(Level, String)>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, level: Level) -> usize {
        self.events.iter().filter(|(l, _)| *l == level).count()
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.events.iter().any(|(_, text)| text.contains(fragment))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl EventSink for Recorder {
    fn record(&mut self, event: &BootEvent<'_>) {
        self.events.push((event.level(), format!("{:?}", event)));
    }
}

/// `ufmt` writer collecting into a string
#[derive(Default)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl ufmt::uWrite for TextBuffer {
    type Error = core::convert::Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.text.push_str(s);
        Ok(())
    }
}
