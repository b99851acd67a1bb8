//! Servo pulse engine
//!
//! One hardware timebase drives up to [`MAX_CHANNELS`] hobby-servo outputs.
//! Each frame emits the channel pulses back to back, then pauses so that the
//! whole frame lasts a fixed period. The RC input is sampled during that
//! pause.
//!
//! The engine is split in two halves:
//! - [`ServoBank`] holds the commanded widths. It is shared between the
//!   interrupt context and the main loop through single-word atomics.
//! - [`PulseTrain`] is owned by the pulse task. It walks the bank one slot at
//!   a time and says what the outputs do next.
//!
//! [`word`] encodes those slots for the PIO program that actually drives
//! the pins.

pub mod bank;
pub mod train;
pub mod word;

pub use bank::ServoBank;
pub use train::{PulseTrain, Step};

/// Maximum number of servo channels
pub const MAX_CHANNELS: usize = 12;

/// Shortest legal pulse (µs)
pub const PULSE_MIN_US: i16 = 500;

/// Longest legal pulse (µs)
pub const PULSE_MAX_US: i16 = 2500;

/// Center position (µs)
pub const PULSE_CENTER_US: i16 = 1500;

/// Sentinel width: emit no pulse on this channel (motor unpowered)
pub const NO_PULSE: i16 = -1;

/// Clip a commanded width into `[min, max]`
///
/// [`NO_PULSE`] and any negative value map to [`NO_PULSE`].
pub fn clip_width(width: i16, min: i16, max: i16) -> i16 {
    if width < 0 {
        NO_PULSE
    } else {
        width.clamp(min, max)
    }
}

/// Mirror a width about the center position
pub const fn mirror_width(width: i16) -> i16 {
    2 * PULSE_CENTER_US - width
}
