//! Pin allocation by GPIO number
//!
//! Lets `board.toml` choose the servo and RC pins at startup instead of
//! hardcoding them. Every free pin is handed to PIO0, which drives the
//! servo block and samples the RC input; pins nobody takes stay inputs.

use defmt::Format;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::Pin;

/// GPIO pins on the RP2040
pub const PIN_COUNT: usize = 30;

/// Error when requesting a pin
#[derive(Debug, Clone, Copy, Format)]
pub enum PinError {
    /// Pin number out of range (0-29 valid)
    InvalidPin,
    /// Pin already taken or reserved
    Unavailable,
}

/// All free GPIO pins, taken out one at a time by number
pub struct PinBank {
    pins: [Option<Pin<'static, PIO0>>; PIN_COUNT],
}

impl PinBank {
    /// Create a bank from the pins not claimed elsewhere
    pub fn new(pins: [Option<Pin<'static, PIO0>>; PIN_COUNT]) -> Self {
        Self { pins }
    }

    /// Take a pin by number
    pub fn take(&mut self, pin: u8) -> Result<Pin<'static, PIO0>, PinError> {
        self.pins
            .get_mut(pin as usize)
            .ok_or(PinError::InvalidPin)?
            .take()
            .ok_or(PinError::Unavailable)
    }
}
