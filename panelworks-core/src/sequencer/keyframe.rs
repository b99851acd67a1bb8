//! Keyframe (sequence row) types

use crate::servo::{MAX_CHANNELS, NO_PULSE};

/// Target for one channel in a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Target {
    /// Leave the channel's last commanded value untouched
    #[default]
    Keep,
    /// Stop emitting pulses on the channel
    Off,
    /// Move to a pulse width (µs)
    Move(u16),
    /// Move to the board's open panel position
    Open,
    /// Move to the board's closed panel position
    Closed,
}

impl Target {
    /// Commanded width for this target, if it changes the channel
    pub fn width(self, positions: PanelPositions) -> Option<i16> {
        let saturate = |w: u16| w.min(i16::MAX as u16) as i16;
        match self {
            Target::Keep => None,
            Target::Off => Some(NO_PULSE),
            // Saturated widths are clipped to the upper limit by the bank
            Target::Move(w) => Some(saturate(w)),
            Target::Open => Some(saturate(positions.open_us)),
            Target::Closed => Some(saturate(positions.closed_us)),
        }
    }
}

/// Widths that [`Target::Open`] and [`Target::Closed`] resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelPositions {
    /// Open panel position (µs)
    pub open_us: u16,
    /// Closed panel position (µs)
    pub closed_us: u16,
}

impl PanelPositions {
    /// Positions of a stock panel servo
    pub const DEFAULT: Self = Self {
        open_us: 1000,
        closed_us: 2000,
    };
}

impl Default for PanelPositions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One row of a motion script
///
/// A row with `duration == 0` terminates the sequence; its targets are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Keyframe {
    /// How long the row stays current, in ticks
    pub duration: u16,
    /// Per-channel targets (index 0 = channel 1)
    pub targets: [Target; MAX_CHANNELS],
}

impl Keyframe {
    /// Build a row from leading channel targets
    ///
    /// Channels not listed are [`Target::Keep`]. Extra entries beyond
    /// [`MAX_CHANNELS`] are dropped.
    pub const fn new(duration: u16, targets: &[Target]) -> Self {
        let mut row = [Target::Keep; MAX_CHANNELS];
        let mut i = 0;
        while i < targets.len() && i < MAX_CHANNELS {
            row[i] = targets[i];
            i += 1;
        }
        Self {
            duration,
            targets: row,
        }
    }

    /// Row with every channel set to the same target
    pub const fn uniform(duration: u16, target: Target) -> Self {
        Self {
            duration,
            targets: [target; MAX_CHANNELS],
        }
    }

    /// Terminating row
    pub const fn end() -> Self {
        Self::uniform(0, Target::Keep)
    }

    /// Check if this row terminates the sequence
    pub const fn is_end(&self) -> bool {
        self.duration == 0
    }

    /// Target for a channel (1-based)
    pub fn target(&self, channel: u8) -> Target {
        channel
            .checked_sub(1)
            .and_then(|i| self.targets.get(i as usize))
            .copied()
            .unwrap_or_default()
    }
}

/// An immutable motion script
///
/// Rows are played in order up to the first terminating row. A script
/// without a terminating row ends after its last row.
pub type Sequence = &'static [Keyframe];

/// Total ticks a sequence takes to play to completion
pub fn sequence_ticks(sequence: &[Keyframe]) -> u32 {
    sequence
        .iter()
        .take_while(|row| !row.is_end())
        .map(|row| row.duration as u32)
        .sum()
}
