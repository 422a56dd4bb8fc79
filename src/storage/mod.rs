//! Persistent storage access for boot images
//!
//! Resources are named, read-only byte blobs. The boot code only ever
//! needs their size and a sequential reader, so that is all the
//! [`Storage`] trait asks of a backend.

pub mod volume;

pub use volume::{FlashVolume, VolumeHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No resource with that name
    NotFound,
    /// Directory is missing or inconsistent
    BadVolume,
    /// Underlying device reported a read failure
    Device,
    /// Resource does not fit the caller's buffer
    TooLarge { len: u32, capacity: usize },
    /// Resource ended before its recorded length
    ShortRead { expected: u32, actual: u32 },
}

impl StorageError {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageError::NotFound => "not found",
            StorageError::BadVolume => "bad volume",
            StorageError::Device => "device error",
            StorageError::TooLarge { .. } => "too large",
            StorageError::ShortRead { .. } => "short read",
        }
    }
}

/// Read-only resource store
pub trait Storage {
    type Handle;

    /// Byte length of the named resource
    fn size_of(&mut self, name: &str) -> Result<u32, StorageError>;

    fn exists(&mut self, name: &str) -> bool {
        self.size_of(name).is_ok()
    }

    /// Open the named resource for sequential reading from its start
    fn open(&mut self, name: &str) -> Result<Self::Handle, StorageError>;

    /// Read up to `buf.len()` bytes; `Ok(0)` means the resource is exhausted
    fn read(&mut self, handle: &mut Self::Handle, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn close(&mut self, handle: Self::Handle);
}

/// Storage ran dry before the buffer was filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortRead {
    pub actual: usize,
}

/// Fill `buf` completely or report how many bytes were obtained
pub fn read_exact<S: Storage + ?Sized>(
    storage: &mut S,
    handle: &mut S::Handle,
    buf: &mut [u8],
) -> Result<(), ShortRead> {
    let mut filled = 0;
    while filled < buf.len() {
        match storage.read(handle, &mut buf[filled..]) {
            Ok(0) | Err(_) => return Err(ShortRead { actual: filled }),
            Ok(n) => filled += n,
        }
    }
    Ok(())
}

/// Load a whole resource into `buf` and return the filled prefix
pub fn read_resource<'b, S: Storage + ?Sized>(
    storage: &mut S,
    name: &str,
    buf: &'b mut [u8],
) -> Result<&'b [u8], StorageError> {
    let len = storage.size_of(name)?;
    // usize is 16 bits on AVR, so compare in u32
    if len > u32::try_from(buf.len()).unwrap_or(u32::MAX) {
        return Err(StorageError::TooLarge {
            len,
            capacity: buf.len(),
        });
    }

    let mut handle = storage.open(name)?;
    let image: &'b mut [u8] = &mut buf[..len as usize];
    let result = read_exact(storage, &mut handle, image);
    storage.close(handle);

    match result {
        Ok(()) => Ok(image),
        Err(ShortRead { actual }) => Err(StorageError::ShortRead {
            expected: len,
            actual: actual as u32,
        }),
    }
}
