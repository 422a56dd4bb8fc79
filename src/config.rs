//! Configuration constants for the FPGA boot firmware

/// Firmware version reported at startup
pub const FIRMWARE_VERSION: &str = "0.4";

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 16_000_000;

/// UART baud rate
pub const UART_BAUD: u32 = 9600;

/// Main FPGA design, loaded last
pub const BITSTREAM_IMAGE: &str = "bitstream.bin";

/// FPGA design that relays the SPI bus to the PSRAM
pub const PASSTHROUGH_IMAGE: &str = "spi_pass.bin";

/// Address-prefixed image preloaded into PSRAM
pub const PSRAM_IMAGE: &str = "psram.bin";

/// Extra configuration attempts after the first rejection
pub const CONFIG_RETRIES: u8 = 4;

/// Length of one addressed PSRAM write; only the last chunk is shorter
pub const MAX_CHUNK_LEN: u32 = 65536;

/// Little-endian base address in front of a PSRAM image
pub const ADDRESS_HEADER_LEN: u32 = 4;

/// PSRAM capacity in bytes (64 Mbit)
pub const PSRAM_SIZE: u32 = 0x80_0000;

/// PSRAM wraps bursts at page boundaries
pub const PSRAM_PAGE_SIZE: u32 = 1024;

/// CRESET low time in microseconds (datasheet minimum is 200 ns)
pub const ICE_RESET_PULSE_US: u32 = 1;

/// Time for the iCE40 to clear its configuration memory
pub const ICE_CLEAR_US: u32 = 1200;

/// CDONE polls after the bitstream before giving up
pub const ICE_DONE_POLLS: u16 = 1000;

/// Delay between CDONE polls in microseconds
pub const ICE_DONE_POLL_US: u32 = 10;

/// Offset of the resource volume in external flash
pub const VOLUME_BASE: u32 = 0x0000_0000;

/// Resource directory capacity
pub const MAX_VOLUME_ENTRIES: u16 = 32;

/// First external SRAM address; nothing is linked at or above it
pub const XMEM_START: usize = 0x1100;

/// Staging buffer for PSRAM chunks, refilled several times per chunk
pub const CHUNK_BUFFER_LEN: usize = 4096;

/// Board buffer for FPGA bitstreams (iCE40HX1K images are 32220 bytes)
pub const IMAGE_BUFFER_LEN: usize = 32 * 1024;

/// LED blink half-period when boot went wrong
pub const BLINK_FAST_MS: u16 = 100;

/// LED blink half-period once the FPGA is up
pub const BLINK_SLOW_MS: u16 = 500;
