#![cfg_attr(all(target_arch = "avr", feature = "atmega128"), no_std, no_main)]

#[cfg(all(target_arch = "avr", feature = "atmega128"))]
mod board_main {
    use embedded_hal::blocking::delay::DelayMs;
    use embedded_hal::digital::v2::OutputPin;
    use panic_halt as _;

    use ice_boot_firmware::config::{
        BLINK_FAST_MS, BLINK_SLOW_MS, CHUNK_BUFFER_LEN, IMAGE_BUFFER_LEN, VOLUME_BASE, XMEM_START,
    };
    use ice_boot_firmware::drivers::{Flash, Ice40};
    use ice_boot_firmware::hal::gpio::board;
    use ice_boot_firmware::hal::{Delay, Spi, SpiPrescaler, Uart};
    use ice_boot_firmware::logger::DEFAULT_LEVEL;
    use ice_boot_firmware::{BootEvent, BootSequencer, ConsoleLogger, EventSink, FlashVolume, StorageError};

    const MCUCR_SRE: u8 = 0x80;

    // Both the flash and the iCE40 run at fosc/2, 8 MHz
    const SPI_CLOCK: SpiPrescaler = SpiPrescaler::Div2;

    fn blink(led: &mut board::LED, delay: &mut Delay, period_ms: u16) -> ! {
        loop {
            led.toggle();
            delay.delay_ms(period_ms);
        }
    }

    /// Enable the external SRAM and split it into the image and chunk buffers.
    ///
    /// Stack, data and bss are all in internal RAM below `XMEM_START`; the
    /// linker places nothing above it, so the region belongs to the caller.
    /// Must be called once.
    unsafe fn xmem_buffers() -> (&'static mut [u8], &'static mut [u8]) {
        (*avr_device::atmega128a::CPU::ptr())
            .mcucr
            .modify(|r, w| w.bits(r.bits() | MCUCR_SRE));

        let base = XMEM_START as *mut u8;
        let image = core::slice::from_raw_parts_mut(base, IMAGE_BUFFER_LEN);
        let chunk = core::slice::from_raw_parts_mut(base.add(IMAGE_BUFFER_LEN), CHUNK_BUFFER_LEN);
        (image, chunk)
    }

    #[avr_device::entry]
    fn main() -> ! {
        let (image_buf, chunk_buf) = unsafe { xmem_buffers() };

        let mut console = ConsoleLogger::new(Uart::new(), DEFAULT_LEVEL);
        let mut delay = Delay::new();
        let mut led = board::LED::output();

        let _ss = board::SPI_SS::output();
        let _sck = board::SPI_SCK::output();
        let _mosi = board::SPI_MOSI::output();
        let _miso = board::SPI_MISO::new();

        let flash_cs = board::FLASH_CS::output();
        let mut ice_ss = board::ICE_SS::output();
        ice_ss.set_high().ok();
        let creset = board::ICE_CRESET::output();
        let cdone = board::ICE_CDONE::new();

        let spi = Spi::new(SPI_CLOCK);

        let mut volume = match Flash::new(spi.share(), flash_cs) {
            Ok(flash) => match FlashVolume::mount(flash, VOLUME_BASE) {
                Ok(volume) => volume,
                Err(error) => {
                    console.record(&BootEvent::VolumeUnavailable { error });
                    blink(&mut led, &mut delay, BLINK_FAST_MS)
                }
            },
            Err(_) => {
                console.record(&BootEvent::VolumeUnavailable {
                    error: StorageError::Device,
                });
                blink(&mut led, &mut delay, BLINK_FAST_MS)
            }
        };

        let mut fpga = Ice40::new(spi, ice_ss, creset, cdone, Delay::new());

        let report = match BootSequencer::new(image_buf, chunk_buf) {
            Ok(mut sequencer) => sequencer.run(&mut volume, &mut fpga, &mut console),
            Err(_) => blink(&mut led, &mut delay, BLINK_FAST_MS),
        };

        volume.release().power_down().ok();

        let period = if report.fpga.is_up() {
            BLINK_SLOW_MS
        } else {
            BLINK_FAST_MS
        };
        blink(&mut led, &mut delay, period)
    }
}

#[cfg(not(all(target_arch = "avr", feature = "atmega128")))]
fn main() {}
