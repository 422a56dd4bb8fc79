//! FPGA configuration with a bounded retry policy

use core::num::NonZeroU8;

use crate::logger::{BootEvent, EventSink};

/// Non-zero status returned by a configuration port that refused an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rejection(pub NonZeroU8);

impl Rejection {
    pub const fn new(status: u8) -> Option<Self> {
        match NonZeroU8::new(status) {
            Some(code) => Some(Rejection(code)),
            None => None,
        }
    }

    pub fn status(&self) -> u8 {
        self.0.get()
    }
}

/// Port that accepts a configuration image
pub trait ConfigChannel {
    /// `Ok` is status 0; anything else is a rejection
    fn configure(&mut self, image: &[u8]) -> Result<(), Rejection>;
}

impl<T: ConfigChannel + ?Sized> ConfigChannel for &mut T {
    fn configure(&mut self, image: &[u8]) -> Result<(), Rejection> {
        (**self).configure(image)
    }
}

/// Configuration image and the resource it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigImage<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
}

/// Attempts allowed after the first rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryBudget(pub u8);

impl RetryBudget {
    pub const NONE: RetryBudget = RetryBudget(0);

    /// Upper bound on configure calls
    pub fn total_attempts(&self) -> u16 {
        self.0 as u16 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigResult {
    Success { attempts: u16 },
    Exhausted { attempts: u16, last_status: u8 },
}

impl ConfigResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConfigResult::Success { .. })
    }

    pub fn attempts(&self) -> u16 {
        match *self {
            ConfigResult::Success { attempts } | ConfigResult::Exhausted { attempts, .. } => attempts,
        }
    }
}

pub struct ConfigLoader {
    budget: RetryBudget,
}

impl ConfigLoader {
    pub const fn new(budget: RetryBudget) -> Self {
        Self { budget }
    }

    /// Push `image` into the device until it is accepted or the budget runs out.
    ///
    /// The image is handed over untouched, empty or not. The outcome only
    /// depends on whether some attempt came back `Ok`.
    pub fn load<C, E>(&self, channel: &mut C, image: &[u8], sink: &mut E) -> ConfigResult
    where
        C: ConfigChannel + ?Sized,
        E: EventSink + ?Sized,
    {
        let total = self.budget.total_attempts();

        let mut rejection = match channel.configure(image) {
            Ok(()) => return accepted(1, sink),
            Err(rejection) => rejection,
        };
        sink.record(&BootEvent::ConfigRejected {
            attempt: 1,
            status: rejection.status(),
        });

        for attempt in 2..=total {
            match channel.configure(image) {
                Ok(()) => return accepted(attempt, sink),
                Err(again) => {
                    rejection = again;
                    sink.record(&BootEvent::ConfigRejected {
                        attempt,
                        status: rejection.status(),
                    });
                }
            }
        }

        sink.record(&BootEvent::ConfigExhausted { attempts: total });
        ConfigResult::Exhausted {
            attempts: total,
            last_status: rejection.status(),
        }
    }
}

fn accepted<E: EventSink + ?Sized>(attempts: u16, sink: &mut E) -> ConfigResult {
    sink.record(&BootEvent::ConfigAccepted { attempts });
    ConfigResult::Success { attempts }
}
