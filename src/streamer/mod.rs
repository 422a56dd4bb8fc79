//! PSRAM preload from an address-prefixed storage resource
//!
//! The resource starts with a little-endian `u32` base address; the rest
//! is written to PSRAM from that address on, one chunk at a time. The
//! FPGA has to be running the SPI pass-through design first, so the
//! streamer drives a [`ConfigLoader`] before touching the memory.

use crate::config::{ADDRESS_HEADER_LEN, MAX_CHUNK_LEN};
use crate::loader::{ConfigChannel, ConfigImage, ConfigLoader, RetryBudget};
use crate::logger::{BootEvent, EventSink};
use crate::storage::{read_exact, ShortRead, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteError {
    /// Range falls outside the memory device, or outside the open write
    OutOfRange,
    /// SPI or chip-select failure mid transfer
    Bus,
}

impl WriteError {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteError::OutOfRange => "out of range",
            WriteError::Bus => "bus error",
        }
    }
}

/// Addressed write path into external memory.
///
/// One addressed write is `begin`, any number of `push`es carrying the
/// bytes in order, then `end`. The data never has to sit in RAM all at
/// once.
pub trait MemoryChannel {
    /// Open a write of `len` bytes starting at `address`
    fn begin(&mut self, address: u32, len: u32) -> Result<(), WriteError>;

    /// Next bytes of the open write
    fn push(&mut self, data: &[u8]) -> Result<(), WriteError>;

    fn end(&mut self) -> Result<(), WriteError>;

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), WriteError> {
        let len = u32::try_from(data.len()).map_err(|_| WriteError::OutOfRange)?;
        self.begin(address, len)?;
        let pushed = self.push(data);
        let ended = self.end();
        pushed.and(ended)
    }
}

impl<T: MemoryChannel + ?Sized> MemoryChannel for &mut T {
    fn begin(&mut self, address: u32, len: u32) -> Result<(), WriteError> {
        (**self).begin(address, len)
    }

    fn push(&mut self, data: &[u8]) -> Result<(), WriteError> {
        (**self).push(data)
    }

    fn end(&mut self) -> Result<(), WriteError> {
        (**self).end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamOutcome {
    /// Resource absent; nothing was touched
    NotFound,
    /// No payload behind the address header
    Empty,
    /// Pass-through design could not be loaded; nothing was written
    ConfigurationFailed,
    /// Storage ran out early
    Truncated { written: u32 },
    /// Memory refused the chunk at `address`
    TransportWriteFailure { written: u32, address: u32 },
    Success { written: u32 },
}

impl StreamOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StreamOutcome::Success { .. })
    }

    /// Payload bytes that reached memory
    pub fn written(&self) -> u32 {
        match *self {
            StreamOutcome::Truncated { written }
            | StreamOutcome::TransportWriteFailure { written, .. }
            | StreamOutcome::Success { written } => written,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamerError {
    /// Chunk buffer has no room at all
    NoBuffer,
}

/// Interpret the 4-byte resource header as a base address
pub fn parse_address(header: [u8; ADDRESS_HEADER_LEN as usize]) -> u32 {
    u32::from_le_bytes(header)
}

/// Position of an in-flight stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    remaining: u32,
    address: u32,
}

impl StreamCursor {
    pub fn new(address: u32, len: u32) -> Self {
        Self {
            remaining: len,
            address,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    /// Size of the next chunk given a chunk limit
    pub fn next_len(&self, limit: u32) -> u32 {
        self.remaining.min(limit)
    }

    pub fn advance(&mut self, len: u32) {
        self.remaining -= len;
        self.address = self.address.wrapping_add(len);
    }
}

/// Why a chunk stopped early; `pushed` bytes of it reached the device
enum ChunkError {
    Short { pushed: u32 },
    Write { pushed: u32, error: WriteError },
}

pub struct MemoryStreamer<'b> {
    loader: ConfigLoader,
    buffer: &'b mut [u8],
}

impl<'b> MemoryStreamer<'b> {
    /// `buffer` stages storage reads. Chunks are always [`MAX_CHUNK_LEN`]
    /// long except the last; a buffer shorter than that is refilled
    /// within the chunk.
    pub fn new(budget: RetryBudget, buffer: &'b mut [u8]) -> Result<Self, StreamerError> {
        if buffer.is_empty() {
            return Err(StreamerError::NoBuffer);
        }

        Ok(Self {
            loader: ConfigLoader::new(budget),
            buffer,
        })
    }

    /// Bytes moved per storage read
    pub fn staging_len(&self) -> u32 {
        u32::try_from(self.buffer.len())
            .unwrap_or(u32::MAX)
            .min(MAX_CHUNK_LEN)
    }

    /// Preload PSRAM from `name`.
    ///
    /// `passthrough` is the FPGA image that exposes the memory on the bus;
    /// `None` means it could not be read and nothing gets written.
    pub fn stream_resource<S, D, E>(
        &mut self,
        name: &str,
        passthrough: Option<ConfigImage<'_>>,
        storage: &mut S,
        device: &mut D,
        sink: &mut E,
    ) -> StreamOutcome
    where
        S: Storage + ?Sized,
        D: ConfigChannel + MemoryChannel + ?Sized,
        E: EventSink + ?Sized,
    {
        sink.record(&BootEvent::StreamStart { name });

        let len = match storage.size_of(name) {
            Ok(len) => len,
            Err(error) => {
                sink.record(&BootEvent::StreamMissing { name, error });
                return StreamOutcome::NotFound;
            }
        };

        if len <= ADDRESS_HEADER_LEN {
            sink.record(&BootEvent::StreamEmpty { name, len });
            return StreamOutcome::Empty;
        }

        let passthrough = match passthrough {
            Some(image) => image,
            None => {
                sink.record(&BootEvent::PassthroughUnavailable);
                return StreamOutcome::ConfigurationFailed;
            }
        };
        sink.record(&BootEvent::FpgaLoad {
            name: passthrough.name,
            len: passthrough.data.len() as u32,
        });
        if !self.loader.load(device, passthrough.data, sink).is_success() {
            sink.record(&BootEvent::PassthroughFailed { name });
            return StreamOutcome::ConfigurationFailed;
        }

        let mut handle = match storage.open(name) {
            Ok(handle) => handle,
            Err(error) => {
                sink.record(&BootEvent::StreamOpenFailed { name, error });
                return StreamOutcome::NotFound;
            }
        };

        let outcome = self.stream_payload(name, len - ADDRESS_HEADER_LEN, storage, &mut handle, device, sink);
        storage.close(handle);

        match outcome {
            StreamOutcome::Success { written } => {
                sink.record(&BootEvent::StreamComplete { name, written })
            }
            other => sink.record(&BootEvent::StreamFailed {
                name,
                written: other.written(),
            }),
        }
        outcome
    }

    fn stream_payload<S, D, E>(
        &mut self,
        name: &str,
        payload_len: u32,
        storage: &mut S,
        handle: &mut S::Handle,
        device: &mut D,
        sink: &mut E,
    ) -> StreamOutcome
    where
        S: Storage + ?Sized,
        D: MemoryChannel + ?Sized,
        E: EventSink + ?Sized,
    {
        let mut header = [0u8; ADDRESS_HEADER_LEN as usize];
        if let Err(ShortRead { actual }) = read_exact(storage, handle, &mut header) {
            sink.record(&BootEvent::HeaderShort {
                name,
                actual: actual as u32,
            });
            return StreamOutcome::Truncated { written: 0 };
        }

        let mut cursor = StreamCursor::new(parse_address(header), payload_len);
        sink.record(&BootEvent::StreamHeader {
            name,
            address: cursor.address(),
            len: payload_len,
        });

        let mut written = 0u32;
        while !cursor.is_done() {
            let chunk_len = cursor.next_len(MAX_CHUNK_LEN);
            let address = cursor.address();

            match self.write_chunk(name, address, chunk_len, storage, handle, device, sink) {
                Ok(()) => {}
                Err(ChunkError::Short { pushed }) => {
                    return StreamOutcome::Truncated {
                        written: written + pushed,
                    };
                }
                Err(ChunkError::Write { pushed, error }) => {
                    sink.record(&BootEvent::WriteFailed {
                        address,
                        len: chunk_len,
                        error,
                    });
                    return StreamOutcome::TransportWriteFailure {
                        written: written + pushed,
                        address,
                    };
                }
            }

            sink.record(&BootEvent::ChunkWritten {
                address,
                len: chunk_len,
            });
            cursor.advance(chunk_len);
            written += chunk_len;
        }

        StreamOutcome::Success { written }
    }

    /// One addressed write of `len` bytes, fed through the staging buffer
    #[allow(clippy::too_many_arguments)]
    fn write_chunk<S, D, E>(
        &mut self,
        name: &str,
        address: u32,
        len: u32,
        storage: &mut S,
        handle: &mut S::Handle,
        device: &mut D,
        sink: &mut E,
    ) -> Result<(), ChunkError>
    where
        S: Storage + ?Sized,
        D: MemoryChannel + ?Sized,
        E: EventSink + ?Sized,
    {
        device
            .begin(address, len)
            .map_err(|error| ChunkError::Write { pushed: 0, error })?;

        let staging = self.staging_len();
        let mut pushed = 0u32;
        let result = loop {
            if pushed == len {
                break Ok(());
            }

            let piece_len = (len - pushed).min(staging);
            let piece = &mut self.buffer[..piece_len as usize];
            if let Err(ShortRead { actual }) = read_exact(storage, handle, piece) {
                sink.record(&BootEvent::ShortRead {
                    name,
                    address: address.wrapping_add(pushed),
                    requested: piece_len,
                    actual: actual as u32,
                });
                break Err(ChunkError::Short { pushed });
            }

            if let Err(error) = device.push(piece) {
                break Err(ChunkError::Write { pushed, error });
            }
            pushed += piece_len;
        };

        // The write is closed on every path
        let ended = device.end();
        match (result, ended) {
            (Ok(()), Err(error)) => Err(ChunkError::Write { pushed, error }),
            (result, _) => result,
        }
    }
}
