//! Polled USART0 transmitter for the boot console

use avr_device::atmega128a::USART0;
use core::convert::Infallible;
use core::marker::PhantomData;

use crate::config::{CPU_FREQ_HZ, UART_BAUD};

const UBRR: u16 = (CPU_FREQ_HZ / (16 * UART_BAUD) - 1) as u16;

const UDRE: u8 = 1 << 5;
const TXEN: u8 = 1 << 3;
const RXEN: u8 = 1 << 4;
// 8N1
const UCSZ_8BIT: u8 = 0x06;

/// Boot runs with interrupts off, so no ring buffer: every byte waits
/// for the data register.
pub struct Uart {
    _usart: PhantomData<USART0>,
}

impl Uart {
    pub fn new() -> Self {
        unsafe {
            let p = USART0::ptr();
            (*p).ubrr0h.write(|w| w.bits((UBRR >> 8) as u8));
            (*p).ubrr0l.write(|w| w.bits(UBRR as u8));
            (*p).ucsr0c.write(|w| w.bits(UCSZ_8BIT));
            (*p).ucsr0b.write(|w| w.bits(RXEN | TXEN));
        }

        Self {
            _usart: PhantomData,
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        unsafe {
            let p = USART0::ptr();
            while (*p).ucsr0a.read().bits() & UDRE == 0 {}
            (*p).udr0.write(|w| w.bits(byte));
        }
    }
}

impl ufmt::uWrite for Uart {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}
