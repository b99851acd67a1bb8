//! Board configuration types
//!
//! These types describe one controller board: which pins drive the servos,
//! where the RC input and command UART live, and the timing limits of the
//! pulse engine. The firmware builds a [`BoardConfig`] at startup.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::servo::{MAX_CHANNELS, PULSE_CENTER_US, PULSE_MAX_US, PULSE_MIN_US};

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Unknown `[section]` header
    InvalidSection,
    /// Value could not be parsed for its key
    InvalidValue,
    /// Pin string is not of the form `gpioNN`
    InvalidPin,
    /// More servo pins than the engine supports
    TooManyChannels,
    /// No servo pins configured
    NoChannels,
    /// Pulse limits do not bracket the center position
    InvalidLimits,
    /// Frame period cannot hold the pause
    InvalidPeriod,
    /// RC valid window is empty or the threshold is zero
    InvalidRcWindow,
    /// Open or closed panel position lies outside the pulse limits
    InvalidPosition,
    /// Servo pins are not consecutive GPIOs in channel order
    PinsNotContiguous,
    /// Two functions share a pin
    PinConflict,
}

/// Pin configuration with optional inversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinConfig {
    /// GPIO pin number (0-29 for RP2040)
    pub pin: u8,
    /// Pin is active-low (inverting buffer on the output)
    pub inverted: bool,
    /// Enable internal pull-up
    pub pull_up: bool,
}

impl PinConfig {
    /// Create a new pin config
    pub const fn new(pin: u8) -> Self {
        Self {
            pin,
            inverted: false,
            pull_up: false,
        }
    }

    /// Create an inverted (active-low) pin
    pub const fn inverted(pin: u8) -> Self {
        Self {
            pin,
            inverted: true,
            pull_up: false,
        }
    }

    /// Create a pin with pull-up enabled
    pub const fn with_pullup(pin: u8) -> Self {
        Self {
            pin,
            inverted: false,
            pull_up: true,
        }
    }
}

/// Servo output and pulse train timing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServoConfig {
    /// Output pins, one per channel (channel 1 first)
    ///
    /// The pins form one block of consecutive GPIOs driven by a single PIO
    /// state machine.
    pub pins: Vec<PinConfig, MAX_CHANNELS>,
    /// Mirror every emitted width about the center position
    pub reversed: bool,
    /// Shortest pulse (µs)
    pub min_us: u16,
    /// Longest pulse (µs)
    pub max_us: u16,
    /// Full frame period, pulses plus pause (µs)
    pub period_us: u32,
    /// Shortest pause after the pulse train (µs)
    pub min_pause_us: u32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        let mut pins = Vec::new();
        for pin in 2..12 {
            // 10 pins fit in a 12-slot vector
            let _ = pins.push(PinConfig::new(pin));
        }
        Self {
            pins,
            reversed: false,
            min_us: PULSE_MIN_US as u16,
            max_us: PULSE_MAX_US as u16,
            period_us: 24_000,
            min_pause_us: 4_000,
        }
    }
}

impl ServoConfig {
    /// Number of configured channels
    pub fn channel_count(&self) -> u8 {
        self.pins.len() as u8
    }
}

/// RC input capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RcConfig {
    /// Input pin
    pub pin: PinConfig,
    /// Consecutive failed captures before the signal is reported lost
    pub bad_sample_threshold: u8,
    /// Shortest pulse accepted as valid (µs)
    pub min_valid_us: u16,
    /// Longest pulse accepted as valid (µs)
    pub max_valid_us: u16,
}

impl Default for RcConfig {
    fn default() -> Self {
        Self {
            pin: PinConfig::new(12),
            bad_sample_threshold: 10,
            min_valid_us: 800,
            max_valid_us: 2200,
        }
    }
}

/// Buzz-kill policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuzzKillConfig {
    /// Closed reference position (µs)
    pub closed_us: u16,
    /// Distance from the closed position still treated as closed (µs)
    pub tolerance_us: u16,
    /// Ticks a channel holds closed before it is depowered
    pub debounce_ticks: u16,
}

impl Default for BuzzKillConfig {
    fn default() -> Self {
        Self {
            closed_us: 2000,
            tolerance_us: 10,
            debounce_ticks: 33,
        }
    }
}

/// Panel positions used by the open/close commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PanelConfig {
    /// Open position (µs)
    pub open_us: u16,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { open_us: 1000 }
    }
}

/// Command UART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UartConfig {
    /// UART TX pin
    pub tx_pin: u8,
    /// UART RX pin
    pub rx_pin: u8,
    /// Baud rate
    pub baud_rate: u32,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            tx_pin: 0,
            rx_pin: 1,
            baud_rate: 9600,
        }
    }
}

/// Complete board configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoardConfig {
    /// Servo outputs and timing
    pub servo: ServoConfig,
    /// RC input
    pub rc: RcConfig,
    /// Buzz-kill policy
    pub buzz_kill: BuzzKillConfig,
    /// Panel positions
    pub panel: PanelConfig,
    /// Command UART
    pub uart: UartConfig,
}

impl BoardConfig {
    /// Create the default board configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of servo channels
    pub fn channel_count(&self) -> u8 {
        self.servo.channel_count()
    }

    /// Closed panel position (µs)
    pub fn closed_us(&self) -> u16 {
        self.buzz_kill.closed_us
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servo.pins.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        let pins = &self.servo.pins;
        if pins.windows(2).any(|pair| pair[1].pin != pair[0].pin.wrapping_add(1)) {
            return Err(ConfigError::PinsNotContiguous);
        }
        let block = pins[0].pin..=pins[pins.len() - 1].pin;
        let uart = [self.uart.tx_pin, self.uart.rx_pin];
        let rc = self.rc.pin.pin;
        if block.contains(&rc) || uart.contains(&rc) || uart.iter().any(|p| block.contains(p)) {
            return Err(ConfigError::PinConflict);
        }

        let center = PULSE_CENTER_US as u16;
        if self.servo.min_us >= center
            || self.servo.max_us <= center
            || self.servo.min_us < PULSE_MIN_US as u16
            || self.servo.max_us > PULSE_MAX_US as u16
        {
            return Err(ConfigError::InvalidLimits);
        }

        if self.servo.period_us <= self.servo.min_pause_us {
            return Err(ConfigError::InvalidPeriod);
        }

        if self.rc.bad_sample_threshold == 0 || self.rc.min_valid_us >= self.rc.max_valid_us {
            return Err(ConfigError::InvalidRcWindow);
        }

        let limits = self.servo.min_us..=self.servo.max_us;
        if !limits.contains(&self.panel.open_us) || !limits.contains(&self.buzz_kill.closed_us) {
            return Err(ConfigError::InvalidPosition);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_config() {
        let pin = PinConfig::new(10);
        assert_eq!(pin.pin, 10);
        assert!(!pin.inverted);
        assert!(!pin.pull_up);

        assert!(PinConfig::inverted(12).inverted);
        assert!(PinConfig::with_pullup(4).pull_up);
    }

    #[test]
    fn test_default_board() {
        let config = BoardConfig::new();
        assert_eq!(config.channel_count(), 10);
        assert_eq!(config.servo.pins[0].pin, 2);
        assert_eq!(config.closed_us(), 2000);
        assert_eq!(config.rc.bad_sample_threshold, 10);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let mut config = BoardConfig::new();
        config.servo.min_us = 1600;
        assert_eq!(config.validate(), Err(ConfigError::InvalidLimits));
    }

    #[test]
    fn test_validate_rejects_short_period() {
        let mut config = BoardConfig::new();
        config.servo.period_us = config.servo.min_pause_us;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPeriod));
    }

    #[test]
    fn test_validate_rejects_empty_rc_window() {
        let mut config = BoardConfig::new();
        config.rc.min_valid_us = 2200;
        assert_eq!(config.validate(), Err(ConfigError::InvalidRcWindow));
    }

    #[test]
    fn test_validate_rejects_positions_outside_limits() {
        let mut config = BoardConfig::new();
        config.servo.max_us = 1900;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPosition));

        let mut config = BoardConfig::new();
        config.panel.open_us = 400;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPosition));
    }

    #[test]
    fn test_validate_requires_contiguous_servo_pins() {
        let mut config = BoardConfig::new();
        config.servo.pins[4] = PinConfig::new(20);
        assert_eq!(config.validate(), Err(ConfigError::PinsNotContiguous));

        // Descending order breaks the channel-to-bit mapping
        let mut config = BoardConfig::new();
        config.servo.pins.clear();
        for pin in [5, 4, 3] {
            config.servo.pins.push(PinConfig::new(pin)).unwrap();
        }
        assert_eq!(config.validate(), Err(ConfigError::PinsNotContiguous));

        // Inversion is per pin and does not matter
        let mut config = BoardConfig::new();
        config.servo.pins[1] = PinConfig::inverted(3);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_shared_pins() {
        let mut config = BoardConfig::new();
        config.rc.pin = PinConfig::new(7);
        assert_eq!(config.validate(), Err(ConfigError::PinConflict));

        let mut config = BoardConfig::new();
        config.rc.pin = PinConfig::new(1);
        assert_eq!(config.validate(), Err(ConfigError::PinConflict));

        let mut config = BoardConfig::new();
        config.uart.tx_pin = 2;
        assert_eq!(config.validate(), Err(ConfigError::PinConflict));
    }
}
