//! Channel arbiter and buzz-kill
//!
//! Decides per channel whether the RC input, a fixed position, or nothing
//! drives the pulse engine, and depowers servos that sit at the closed
//! position so they stop humming.
//!
//! Buzz-kill for an RC-tracking channel:
//! 1. Reading inside the closed band, channel not yet pending and still
//!    powered: command the exact closed position, start the channel's
//!    debounce timer, mark it pending.
//! 2. Pending and the timer has expired: output [`NO_PULSE`], clear pending.
//! 3. Reading outside the closed band: track it directly, drop pending.
//!
//! A lost RC signal commands [`NO_PULSE`] on every RC-tracking channel.

use crate::capture::RcReading;
use crate::channel::{ChannelMask, ChannelSelect, ChannelTable, OwnerMode};
use crate::clock::{TimerError, TimerRegistry};
use crate::config::BoardConfig;
use crate::servo::{ServoBank, MAX_CHANNELS, NO_PULSE, PULSE_CENTER_US};

/// Events produced by the arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArbiterEvent {
    /// These channels were just depowered by the buzz-kill
    Silenced(ChannelMask),
}

/// Buzz-kill closed band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClosedBand {
    closed_us: u16,
    tolerance_us: u16,
}

impl ClosedBand {
    /// Create a band around `closed_us`
    pub const fn new(closed_us: u16, tolerance_us: u16) -> Self {
        Self {
            closed_us,
            tolerance_us,
        }
    }

    /// Closed reference position
    pub fn closed_us(&self) -> u16 {
        self.closed_us
    }

    /// Check if a reading counts as closed
    ///
    /// Anything at or past the closed position counts, as does anything
    /// short of it by no more than the tolerance.
    pub fn contains(&self, width: u16) -> bool {
        if self.closed_us as i16 >= PULSE_CENTER_US {
            width >= self.closed_us.saturating_sub(self.tolerance_us)
        } else {
            width <= self.closed_us.saturating_add(self.tolerance_us)
        }
    }
}

/// Channel ownership and buzz-kill policy
#[derive(Debug, Clone)]
pub struct ChannelArbiter {
    channels: ChannelTable,
    band: ClosedBand,
    debounce_ticks: u16,
}

impl ChannelArbiter {
    /// Create an arbiter for the configured channels
    ///
    /// Registers one debounce timer per channel.
    pub fn new(config: &BoardConfig, timers: &mut TimerRegistry) -> Result<Self, TimerError> {
        let mut ids = heapless::Vec::<_, MAX_CHANNELS>::new();
        for _ in 0..config.channel_count() {
            let id = timers.register(0)?;
            // channel_count() never exceeds the capacity
            let _ = ids.push(id);
        }

        Ok(Self {
            channels: ChannelTable::new(ids),
            band: ClosedBand::new(config.buzz_kill.closed_us, config.buzz_kill.tolerance_us),
            debounce_ticks: config.buzz_kill.debounce_ticks,
        })
    }

    /// Channel table
    pub fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    /// Mutable channel table
    pub fn channels_mut(&mut self) -> &mut ChannelTable {
        &mut self.channels
    }

    /// Owner of a channel
    pub fn mode(&self, id: u8) -> OwnerMode {
        self.channels.mode(id)
    }

    /// Put channels under RC control
    pub fn enable_rc_tracking(&mut self, select: ChannelSelect) {
        self.set_mode(select, OwnerMode::RcTracking);
    }

    /// Take channels off RC control and hold their current position
    ///
    /// Channels that were not following the RC input are left as they are.
    pub fn disable_rc_tracking(&mut self, select: ChannelSelect) {
        for id in select.channels(self.channels.len()) {
            if let Some(channel) = self.channels.get_mut(id) {
                if channel.mode == OwnerMode::RcTracking {
                    channel.set_mode(OwnerMode::Frozen);
                }
            }
        }
    }

    /// Take channels off RC control and stop their pulses
    pub fn disable_and_depower(&mut self, select: ChannelSelect, bank: &ServoBank) {
        for id in select.channels(self.channels.len()) {
            if let Some(channel) = self.channels.get_mut(id) {
                channel.set_mode(OwnerMode::PoweredOff);
                bank.set(id, NO_PULSE);
            }
        }
    }

    /// Command channels to a fixed position and hold it
    pub fn freeze_at(&mut self, select: ChannelSelect, width: i16, bank: &ServoBank) {
        for id in select.channels(self.channels.len()) {
            if let Some(channel) = self.channels.get_mut(id) {
                channel.set_mode(OwnerMode::Frozen);
                bank.set(id, width);
            }
        }
    }

    /// Close channels, then depower them once the debounce expires
    pub fn close_and_silence(
        &mut self,
        select: ChannelSelect,
        bank: &ServoBank,
        timers: &mut TimerRegistry,
    ) {
        let closed = self.band.closed_us() as i16;
        for id in select.channels(self.channels.len()) {
            if let Some(channel) = self.channels.get_mut(id) {
                channel.set_mode(OwnerMode::Frozen);
                bank.set(id, closed);
                timers.load(channel.debounce, self.debounce_ticks);
                channel.pending_silence = true;
            }
        }
    }

    fn set_mode(&mut self, select: ChannelSelect, mode: OwnerMode) {
        for id in select.channels(self.channels.len()) {
            if let Some(channel) = self.channels.get_mut(id) {
                channel.set_mode(mode);
            }
        }
    }

    /// Run the RC tracking and buzz-kill policy for one tick
    pub fn tick(
        &mut self,
        reading: RcReading,
        bank: &ServoBank,
        timers: &mut TimerRegistry,
    ) -> Option<ArbiterEvent> {
        let mut silenced = ChannelMask::default();
        let closed = self.band.closed_us() as i16;

        for (id, channel) in self.channels.iter_mut() {
            match channel.mode {
                OwnerMode::RcTracking => match reading {
                    RcReading::SignalLost => {
                        channel.pending_silence = false;
                        bank.set(id, NO_PULSE);
                    }
                    RcReading::Pulse(width) if self.band.contains(width) => {
                        if channel.pending_silence {
                            if timers.is_expired(channel.debounce) {
                                bank.set(id, NO_PULSE);
                                channel.pending_silence = false;
                                silenced.insert(id);
                            }
                        } else if bank.read(id) != NO_PULSE {
                            bank.set(id, closed);
                            timers.load(channel.debounce, self.debounce_ticks);
                            channel.pending_silence = true;
                        }
                    }
                    RcReading::Pulse(width) => {
                        channel.pending_silence = false;
                        bank.set(id, width as i16);
                    }
                },
                _ if channel.pending_silence => {
                    if timers.is_expired(channel.debounce) {
                        bank.set(id, NO_PULSE);
                        channel.set_mode(OwnerMode::PoweredOff);
                        silenced.insert(id);
                    }
                }
                _ => {}
            }
        }

        (!silenced.is_empty()).then_some(ArbiterEvent::Silenced(silenced))
    }
}
