//! Boot prologue: preload PSRAM, then bring up the main FPGA design
//!
//! Runs once, single threaded, before anything else on the board starts.
//! Nothing in here is fatal; the report tells the caller what came up.

use crate::config::{
    BITSTREAM_IMAGE, CONFIG_RETRIES, FIRMWARE_VERSION, PASSTHROUGH_IMAGE, PSRAM_IMAGE,
};
use crate::loader::{ConfigChannel, ConfigImage, ConfigLoader, ConfigResult, RetryBudget};
use crate::logger::{BootEvent, EventSink};
use crate::storage::{read_resource, Storage, StorageError};
use crate::streamer::{MemoryChannel, MemoryStreamer, StreamOutcome, StreamerError};

/// Resource names used during boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootImages<'n> {
    pub bitstream: &'n str,
    pub passthrough: &'n str,
    pub psram: &'n str,
}

impl Default for BootImages<'static> {
    fn default() -> Self {
        Self {
            bitstream: BITSTREAM_IMAGE,
            passthrough: PASSTHROUGH_IMAGE,
            psram: PSRAM_IMAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FpgaOutcome {
    Missing,
    Unreadable(StorageError),
    Loaded(ConfigResult),
}

impl FpgaOutcome {
    pub fn is_up(&self) -> bool {
        matches!(self, FpgaOutcome::Loaded(result) if result.is_success())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    pub psram: StreamOutcome,
    pub fpga: FpgaOutcome,
}

/// Read a configuration image from storage and push it into the FPGA
pub fn load_image<S, C, E>(
    name: &str,
    buffer: &mut [u8],
    budget: RetryBudget,
    storage: &mut S,
    channel: &mut C,
    sink: &mut E,
) -> FpgaOutcome
where
    S: Storage + ?Sized,
    C: ConfigChannel + ?Sized,
    E: EventSink + ?Sized,
{
    match read_resource(storage, name, buffer) {
        Ok(image) => {
            sink.record(&BootEvent::FpgaLoad {
                name,
                len: image.len() as u32,
            });
            FpgaOutcome::Loaded(ConfigLoader::new(budget).load(channel, image, sink))
        }
        Err(StorageError::NotFound) => {
            sink.record(&BootEvent::FpgaImageMissing { name });
            FpgaOutcome::Missing
        }
        Err(error) => {
            sink.record(&BootEvent::FpgaImageUnreadable { name, error });
            FpgaOutcome::Unreadable(error)
        }
    }
}

pub struct BootSequencer<'b> {
    images: BootImages<'b>,
    budget: RetryBudget,
    image_buf: &'b mut [u8],
    streamer: MemoryStreamer<'b>,
}

impl<'b> BootSequencer<'b> {
    /// `image_buf` holds one FPGA bitstream at a time, `chunk_buf` is the
    /// PSRAM staging buffer.
    pub fn new(image_buf: &'b mut [u8], chunk_buf: &'b mut [u8]) -> Result<Self, StreamerError> {
        let budget = RetryBudget(CONFIG_RETRIES);
        Ok(Self {
            images: BootImages::default(),
            budget,
            image_buf,
            streamer: MemoryStreamer::new(budget, chunk_buf)?,
        })
    }

    pub fn with_images(mut self, images: BootImages<'b>) -> Self {
        self.images = images;
        self
    }

    pub fn run<S, D, E>(&mut self, storage: &mut S, device: &mut D, sink: &mut E) -> BootReport
    where
        S: Storage + ?Sized,
        D: ConfigChannel + MemoryChannel + ?Sized,
        E: EventSink + ?Sized,
    {
        sink.record(&BootEvent::BootStart {
            version: FIRMWARE_VERSION,
        });

        let passthrough = match read_resource(storage, self.images.passthrough, self.image_buf) {
            Ok(data) => Some(ConfigImage {
                name: self.images.passthrough,
                data,
            }),
            Err(error) => {
                sink.record(&BootEvent::FpgaImageUnreadable {
                    name: self.images.passthrough,
                    error,
                });
                None
            }
        };
        let psram = self
            .streamer
            .stream_resource(self.images.psram, passthrough, storage, device, sink);

        let fpga = load_image(
            self.images.bitstream,
            self.image_buf,
            self.budget,
            storage,
            device,
            sink,
        );

        sink.record(&BootEvent::BootDone {
            fpga_up: fpga.is_up(),
            psram_written: psram.written(),
        });

        BootReport { psram, fpga }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{ConsoleLogger, Level};
    use crate::storage::FlashVolume;
    use crate::testing::{psram_image, volume_image, FakeDevice, MemStorage, RamFlash, Recorder, TextBuffer};

    const PASS: &[u8] = &[0xAA; 40];
    const MAIN: &[u8] = &[0x55; 90];

    #[test]
    fn full_boot_from_flash_volume() {
        let psram = psram_image(0x0001_0000, 300);
        let raw = volume_image(&[
            ("bitstream.bin", MAIN),
            ("spi_pass.bin", PASS),
            ("psram.bin", psram.as_slice()),
        ]);
        let mut volume = FlashVolume::mount(RamFlash::new(raw), 0).unwrap();
        let mut device = FakeDevice::new();
        let mut image_buf = [0u8; 128];
        let mut chunk_buf = [0u8; 64];
        let mut sink = Recorder::new();

        let report = BootSequencer::new(&mut image_buf, &mut chunk_buf)
            .unwrap()
            .run(&mut volume, &mut device, &mut sink);

        assert_eq!(report.psram, StreamOutcome::Success { written: 300 });
        assert_eq!(
            report.fpga,
            FpgaOutcome::Loaded(ConfigResult::Success { attempts: 1 })
        );
        assert!(report.fpga.is_up());
        // pass-through first, main design last
        assert_eq!(device.images(), &[PASS.len(), MAIN.len()]);
        assert_eq!(device.writes().len(), 1);
        assert_eq!(device.pushes(), 5);
        assert_eq!(device.memory_bytes(), &psram[4..]);
        assert_eq!(sink.count(Level::Warn), 0);
        assert_eq!(sink.count(Level::Error), 0);
    }

    #[test]
    fn missing_psram_image_still_configures_fpga() {
        let mut storage = MemStorage::new()
            .with("bitstream.bin", MAIN)
            .with("spi_pass.bin", PASS);
        let mut device = FakeDevice::new();
        let mut image_buf = [0u8; 128];
        let mut chunk_buf = [0u8; 64];

        let report = BootSequencer::new(&mut image_buf, &mut chunk_buf)
            .unwrap()
            .run(&mut storage, &mut device, &mut ());

        assert_eq!(report.psram, StreamOutcome::NotFound);
        assert!(report.fpga.is_up());
        assert_eq!(device.images(), &[MAIN.len()]);
    }

    #[test]
    fn missing_passthrough_skips_psram() {
        let psram = psram_image(0, 10);
        let mut storage = MemStorage::new()
            .with("bitstream.bin", MAIN)
            .with("psram.bin", &psram);
        let mut device = FakeDevice::new();
        let mut image_buf = [0u8; 128];
        let mut chunk_buf = [0u8; 64];
        let mut sink = Recorder::new();

        let report = BootSequencer::new(&mut image_buf, &mut chunk_buf)
            .unwrap()
            .run(&mut storage, &mut device, &mut sink);

        assert_eq!(report.psram, StreamOutcome::ConfigurationFailed);
        assert!(device.writes().is_empty());
        assert!(report.fpga.is_up());
        assert!(sink.contains("PassthroughUnavailable"));
    }

    #[test]
    fn rejected_fpga_is_reported_not_fatal() {
        let mut storage = MemStorage::new().with("bitstream.bin", MAIN);
        let mut device = FakeDevice::new().reject_first(u16::MAX, 2);
        let mut image_buf = [0u8; 128];
        let mut chunk_buf = [0u8; 64];

        let report = BootSequencer::new(&mut image_buf, &mut chunk_buf)
            .unwrap()
            .run(&mut storage, &mut device, &mut ());

        assert_eq!(report.psram, StreamOutcome::NotFound);
        assert_eq!(
            report.fpga,
            FpgaOutcome::Loaded(ConfigResult::Exhausted {
                attempts: 5,
                last_status: 2
            })
        );
        assert!(!report.fpga.is_up());
    }

    #[test]
    fn oversized_bitstream_is_unreadable() {
        let mut storage = MemStorage::new().with("bitstream.bin", &[0; 200]);
        let mut device = FakeDevice::new();
        let mut image_buf = [0u8; 128];
        let mut chunk_buf = [0u8; 64];

        let report = BootSequencer::new(&mut image_buf, &mut chunk_buf)
            .unwrap()
            .run(&mut storage, &mut device, &mut ());

        assert_eq!(
            report.fpga,
            FpgaOutcome::Unreadable(StorageError::TooLarge { len: 200, capacity: 128 })
        );
        assert_eq!(device.configure_calls(), 0);
    }

    #[test]
    fn empty_volume_reports_everything_missing() {
        let mut volume = FlashVolume::mount(RamFlash::new(volume_image(&[])), 0).unwrap();
        let mut device = FakeDevice::new();
        let mut image_buf = [0u8; 16];
        let mut chunk_buf = [0u8; 16];
        let mut sink = Recorder::new();

        let report = BootSequencer::new(&mut image_buf, &mut chunk_buf)
            .unwrap()
            .run(&mut volume, &mut device, &mut sink);

        assert_eq!(report.psram, StreamOutcome::NotFound);
        assert_eq!(report.fpga, FpgaOutcome::Missing);
        assert_eq!(device.configure_calls(), 0);
        // start, pass-through, stream start, stream missing, fpga missing, done
        assert_eq!(sink.len(), 6);
    }

    #[test]
    fn custom_image_names() {
        let mut storage = MemStorage::new().with("alt.bin", MAIN);
        let mut device = FakeDevice::new();
        let mut image_buf = [0u8; 128];
        let mut chunk_buf = [0u8; 64];

        let report = BootSequencer::new(&mut image_buf, &mut chunk_buf)
            .unwrap()
            .with_images(BootImages {
                bitstream: "alt.bin",
                ..BootImages::default()
            })
            .run(&mut storage, &mut device, &mut ());

        assert!(report.fpga.is_up());
    }

    #[test]
    fn console_transcript() {
        let psram = psram_image(0x0001_0000, 8);
        let mut storage = MemStorage::new()
            .with("bitstream.bin", MAIN)
            .with("spi_pass.bin", PASS)
            .with("psram.bin", &psram);
        let mut device = FakeDevice::new();
        let mut image_buf = [0u8; 128];
        let mut chunk_buf = [0u8; 64];
        let mut console = ConsoleLogger::new(TextBuffer::default(), Level::Info);

        BootSequencer::new(&mut image_buf, &mut chunk_buf)
            .unwrap()
            .run(&mut storage, &mut device, &mut console);

        let expected = "I (main) firmware 0.4 starting\r\n\
                        I (psram) preloading from psram.bin\r\n\
                        I (fpga) configuring from spi_pass.bin (40 bytes)\r\n\
                        I (fpga) configured OK after 1 attempt(s)\r\n\
                        I (psram) psram.bin: addr 0x00010000, len 0x00000008\r\n\
                        I (psram) psram.bin loaded OK, 8 bytes\r\n\
                        I (fpga) configuring from bitstream.bin (90 bytes)\r\n\
                        I (fpga) configured OK after 1 attempt(s)\r\n\
                        I (main) boot done: fpga up, psram 8 bytes\r\n";
        assert_eq!(console.into_inner().text(), expected);
    }
}
