//! Per-channel ownership table
//!
//! Every channel has exactly one owner at a time. Changing the owner is the
//! only way control of a channel moves between the RC input, the sequencer,
//! and fixed/manual positions.

use panelworks_protocol::ALL_PANELS;

use crate::clock::TimerId;
use crate::servo::MAX_CHANNELS;

/// Who currently drives a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OwnerMode {
    /// Nobody; the output keeps its last commanded value
    #[default]
    Idle,
    /// Follows the RC input
    RcTracking,
    /// Driven by the sequencer
    Sequencer,
    /// Held at a fixed position
    Frozen,
    /// Output is [`NO_PULSE`](crate::servo::NO_PULSE)
    PoweredOff,
}

/// One servo channel's control state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    /// Current owner
    pub mode: OwnerMode,
    /// Parked at the closed position, waiting to be depowered
    pub pending_silence: bool,
    /// Debounce countdown for the buzz-kill
    pub debounce: TimerId,
}

impl Channel {
    /// Create an idle channel using `debounce` as its timer
    pub const fn new(debounce: TimerId) -> Self {
        Self {
            mode: OwnerMode::Idle,
            pending_silence: false,
            debounce,
        }
    }

    /// Hand the channel to a new owner, abandoning any pending silence
    pub fn set_mode(&mut self, mode: OwnerMode) {
        self.mode = mode;
        self.pending_silence = false;
    }
}

/// Channel selection for ownership commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelSelect {
    /// Every configured channel
    All,
    /// One channel (1-based)
    One(u8),
    /// An inclusive range of channels (1-based)
    Range(u8, u8),
}

impl ChannelSelect {
    /// Map a command argument to a selection
    pub fn from_argument(arg: u8) -> Self {
        if arg == ALL_PANELS {
            ChannelSelect::All
        } else {
            ChannelSelect::One(arg)
        }
    }

    /// Iterate the selected channel ids that exist among `count` channels
    pub fn channels(self, count: u8) -> impl Iterator<Item = u8> {
        let (first, last) = match self {
            ChannelSelect::All => (1, count),
            ChannelSelect::One(id) => (id, id),
            ChannelSelect::Range(first, last) => (first, last),
        };
        first.max(1)..=last.min(count)
    }
}

/// Set of channel ids as a bitmask (bit 0 = channel 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMask(pub u16);

impl ChannelMask {
    /// Add a channel
    pub fn insert(&mut self, channel: u8) {
        if (1..=MAX_CHANNELS as u8).contains(&channel) {
            self.0 |= 1 << (channel - 1);
        }
    }

    /// Check if a channel is in the set
    pub fn contains(&self, channel: u8) -> bool {
        (1..=MAX_CHANNELS as u8).contains(&channel) && self.0 & (1 << (channel - 1)) != 0
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate member channel ids in ascending order
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (1..=MAX_CHANNELS as u8).filter(move |ch| self.contains(*ch))
    }
}

/// Fixed-size table of channels, indexed by 1-based id
#[derive(Debug, Clone)]
pub struct ChannelTable {
    channels: heapless::Vec<Channel, MAX_CHANNELS>,
}

impl ChannelTable {
    /// Build a table from one debounce timer per channel
    pub fn new(timers: impl IntoIterator<Item = TimerId>) -> Self {
        let mut channels = heapless::Vec::new();
        for timer in timers.into_iter().take(MAX_CHANNELS) {
            // take() bounds the count to the capacity
            let _ = channels.push(Channel::new(timer));
        }
        Self { channels }
    }

    /// Number of channels
    pub fn len(&self) -> u8 {
        self.channels.len() as u8
    }

    /// Check if the table has no channels
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel by id
    pub fn get(&self, id: u8) -> Option<&Channel> {
        id.checked_sub(1).and_then(|i| self.channels.get(i as usize))
    }

    /// Mutable channel by id
    pub fn get_mut(&mut self, id: u8) -> Option<&mut Channel> {
        id.checked_sub(1).and_then(|i| self.channels.get_mut(i as usize))
    }

    /// Owner of a channel (unknown ids read as idle)
    pub fn mode(&self, id: u8) -> OwnerMode {
        self.get(id).map(|c| c.mode).unwrap_or_default()
    }

    /// Iterate `(id, channel)` pairs
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u8, &mut Channel)> {
        self.channels
            .iter_mut()
            .enumerate()
            .map(|(i, c)| (i as u8 + 1, c))
    }

    /// Return every channel owned by `mode` to idle
    pub fn release(&mut self, mode: OwnerMode) {
        for (_, channel) in self.iter_mut() {
            if channel.mode == mode {
                channel.set_mode(OwnerMode::Idle);
            }
        }
    }
}
