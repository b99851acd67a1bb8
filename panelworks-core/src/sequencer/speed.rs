//! Per-channel speed limits

use crate::servo::MAX_CHANNELS;

/// Maximum rate of change per channel, in µs per tick
///
/// A rate of `0` means unlimited: the channel jumps straight to each target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedProfile {
    rates: [u16; MAX_CHANNELS],
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl SpeedProfile {
    /// No limits on any channel
    pub const fn unlimited() -> Self {
        Self {
            rates: [0; MAX_CHANNELS],
        }
    }

    /// Same limit on every channel
    pub const fn uniform(rate: u16) -> Self {
        Self {
            rates: [rate; MAX_CHANNELS],
        }
    }

    /// Explicit per-channel limits (index 0 = channel 1)
    pub const fn from_rates(rates: [u16; MAX_CHANNELS]) -> Self {
        Self { rates }
    }

    /// Limit for a channel (1-based); unknown channels are unlimited
    pub fn rate(&self, channel: u8) -> u16 {
        channel
            .checked_sub(1)
            .and_then(|i| self.rates.get(i as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Check if no channel is limited
    pub fn is_unlimited(&self) -> bool {
        self.rates.iter().all(|r| *r == 0)
    }
}

/// Move `current` toward `target` by at most `rate`
pub fn ramp(current: i16, target: i16, rate: u16) -> i16 {
    let rate = rate as i32;
    let delta = (target as i32 - current as i32).clamp(-rate, rate);
    (current as i32 + delta) as i16
}
