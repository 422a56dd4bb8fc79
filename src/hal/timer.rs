use avr_device::atmega128a::TC0;
use core::marker::PhantomData;
use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::config::CPU_FREQ_HZ;

#[derive(Clone, Copy)]
#[repr(u8)]
enum Prescaler {
    Stop = 0,
    Div64 = 4,
}

// 16MHz/64 = 250kHz, 4us per tick
const US_PER_TICK: u32 = 64 * 1_000_000 / CPU_FREQ_HZ;
const TICKS_PER_MS: u8 = (CPU_FREQ_HZ / 64 / 1000) as u8;

/// Busy-wait delays on Timer0, free running in normal mode
pub struct Delay {
    _timer: PhantomData<TC0>,
}

impl Delay {
    pub fn new() -> Self {
        unsafe {
            let p = TC0::ptr();
            (*p).tccr0.write(|w| w.bits(Prescaler::Stop as u8));
            (*p).tcnt0.write(|w| w.bits(0));
        }
        Self {
            _timer: PhantomData,
        }
    }

    fn wait_ticks(&mut self, ticks: u8) {
        unsafe {
            let p = TC0::ptr();
            (*p).tcnt0.write(|w| w.bits(0));
            (*p).tccr0.write(|w| w.bits(Prescaler::Div64 as u8));
            while (*p).tcnt0.read().bits() < ticks {}
            (*p).tccr0.write(|w| w.bits(Prescaler::Stop as u8));
        }
    }
}

impl DelayUs<u32> for Delay {
    fn delay_us(&mut self, us: u32) {
        let mut ticks = (us + US_PER_TICK - 1) / US_PER_TICK;
        while ticks > 0 {
            let step = ticks.min(u8::MAX as u32);
            self.wait_ticks(step as u8);
            ticks -= step;
        }
    }
}

impl DelayMs<u16> for Delay {
    fn delay_ms(&mut self, ms: u16) {
        for _ in 0..ms {
            self.wait_ticks(TICKS_PER_MS);
        }
    }
}
