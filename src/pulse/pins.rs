//! Output pin boundary
//!
//! The scheduler only ever needs "drive pin N high/low". [`GpioPins`] does that
//! through rppal on a Raspberry Pi, [`NullPins`] discards every write for dry
//! runs on machines without GPIO.

use rppal::gpio::{Gpio, OutputPin};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinLevel {
    Low,
    High,
}

/// A bank of output pins addressed by number.
///
/// Implementations are called from the scheduler thread while it is
/// busy-waiting and must not block.
pub trait PinBank: Send {
    fn set_level(&mut self, pin: u8, level: PinLevel);
}

#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error("GPIO peripheral unavailable: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("pin {pin} unavailable: {source}")]
    Pin {
        pin: u8,
        #[source]
        source: rppal::gpio::Error,
    },
}

/// Pins driven through the Raspberry Pi GPIO peripheral
pub struct GpioPins {
    outputs: HashMap<u8, OutputPin>,
}

impl GpioPins {
    /// Claims every pin in `pins` as an output, initially low.
    pub fn open(pins: impl IntoIterator<Item = u8>) -> Result<Self, PinError> {
        let gpio = Gpio::new()?;
        let mut outputs = HashMap::new();
        for pin in pins {
            let output = gpio
                .get(pin)
                .map_err(|source| PinError::Pin { pin, source })?
                .into_output_low();
            debug!("Claimed GPIO {} as output", pin);
            outputs.insert(pin, output);
        }
        info!("GPIO ready with {} output pins", outputs.len());
        Ok(Self { outputs })
    }
}

impl PinBank for GpioPins {
    fn set_level(&mut self, pin: u8, level: PinLevel) {
        // unclaimed pins are "no pin driven"
        if let Some(output) = self.outputs.get_mut(&pin) {
            match level {
                PinLevel::High => output.set_high(),
                PinLevel::Low => output.set_low(),
            }
        }
    }
}

/// Discards all writes
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPins;

impl PinBank for NullPins {
    fn set_level(&mut self, _pin: u8, _level: PinLevel) {}
}
