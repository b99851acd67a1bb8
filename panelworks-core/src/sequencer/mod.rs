//! Keyframe sequencer
//!
//! Plays a [`Sequence`] against the tick clock. Each row becomes current for
//! `duration` ticks. Its targets are applied on the first tick the row is
//! current, so a row's values are in place for its whole duration.
//! Speed-limited channels ramp toward their target by at most their rate
//! each tick; rows advance on elapsed time only and never wait for a ramp
//! to finish.
//!
//! The sequencer claims every channel it writes and leaves channels that
//! follow the RC input alone. When playback stops, its channels are released
//! to idle and keep their last commanded value. When the table ends, ramps
//! still in flight keep running on later ticks and each channel is released
//! once its ramp arrives.

pub mod keyframe;
pub mod speed;

pub use keyframe::{sequence_ticks, Keyframe, PanelPositions, Sequence, Target};
pub use speed::{ramp, SpeedProfile};

use crate::channel::{ChannelTable, OwnerMode};
use crate::servo::{ServoBank, MAX_CHANNELS, NO_PULSE};

/// Sequencer playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencerState {
    /// Not playing
    Idle,
    /// Advancing one tick at a time
    Playing,
}

/// Events produced by the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencerEvent {
    /// The terminating row was reached
    Finished,
}

/// One-shot completion notification
pub type CompletionCallback = fn();

/// Motion script player
#[derive(Debug, Clone)]
pub struct Sequencer {
    sequence: Option<Sequence>,
    state: SequencerState,
    /// Index of the current row
    cursor: usize,
    /// Ticks left on the current row
    remaining: u16,
    /// Current row's targets have not been applied yet
    row_pending: bool,
    speed: SpeedProfile,
    positions: PanelPositions,
    /// Ramp targets for speed-limited channels (index 0 = channel 1)
    ramps: [Option<i16>; MAX_CHANNELS],
    on_complete: Option<CompletionCallback>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    /// Create an idle sequencer with nothing loaded
    pub const fn new() -> Self {
        Self {
            sequence: None,
            state: SequencerState::Idle,
            cursor: 0,
            remaining: 0,
            row_pending: false,
            speed: SpeedProfile::unlimited(),
            positions: PanelPositions::DEFAULT,
            ramps: [None; MAX_CHANNELS],
            on_complete: None,
        }
    }

    /// Select a sequence and rewind to its first row
    ///
    /// Stops any sequence in progress and disarms the completion callback.
    /// The speed profile is kept; playback does not start.
    pub fn load(&mut self, sequence: Sequence, channels: &mut ChannelTable) {
        self.stop(channels);
        self.sequence = Some(sequence);
        self.on_complete = None;
        self.rewind();
    }

    /// Replace the speed profile
    pub fn load_speed(&mut self, profile: SpeedProfile) {
        self.speed = profile;
    }

    /// Clear all speed limits
    pub fn reset_speed(&mut self) {
        self.speed = SpeedProfile::unlimited();
    }

    /// Current speed profile
    pub fn speed(&self) -> &SpeedProfile {
        &self.speed
    }

    /// Set the widths that open and closed targets resolve to
    pub fn set_positions(&mut self, positions: PanelPositions) {
        self.positions = positions;
    }

    /// Widths that open and closed targets resolve to
    pub fn positions(&self) -> PanelPositions {
        self.positions
    }

    /// Arm the one-shot completion callback
    pub fn add_completion_callback(&mut self, callback: CompletionCallback) {
        self.on_complete = Some(callback);
    }

    /// Disarm the completion callback
    pub fn remove_completion_callback(&mut self) {
        self.on_complete = None;
    }

    /// Check if a completion callback is armed
    pub fn has_completion_callback(&self) -> bool {
        self.on_complete.is_some()
    }

    /// Begin or resume playback
    ///
    /// Does nothing without a loaded sequence. A sequence with no rows
    /// completes immediately.
    pub fn start(&mut self, channels: &mut ChannelTable) -> Option<SequencerEvent> {
        if self.sequence.is_none() || self.state == SequencerState::Playing {
            return None;
        }
        if self.current_row().is_none() {
            return Some(self.finish(channels));
        }
        self.state = SequencerState::Playing;
        None
    }

    /// Stop playback where it is (idempotent)
    ///
    /// Channels keep their last commanded value. A later
    /// [`start`](Self::start) resumes at the current row.
    pub fn stop(&mut self, channels: &mut ChannelTable) {
        self.state = SequencerState::Idle;
        self.ramps = [None; MAX_CHANNELS];
        self.row_pending = true;
        channels.release(OwnerMode::Sequencer);
    }

    /// Playback state
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Check if a sequence is playing
    pub fn is_playing(&self) -> bool {
        self.state == SequencerState::Playing
    }

    /// Index of the current row
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Ticks left on the current row
    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    /// Check if ramps from a finished table are still running
    pub fn is_settling(&self) -> bool {
        self.state == SequencerState::Idle && self.ramps.iter().any(Option::is_some)
    }

    /// Advance one tick
    pub fn tick(
        &mut self,
        bank: &ServoBank,
        channels: &mut ChannelTable,
    ) -> Option<SequencerEvent> {
        if self.state != SequencerState::Playing {
            self.step_ramps(bank, channels);
            self.release_settled(channels);
            return None;
        }

        let Some(row) = self.current_row() else {
            return Some(self.finish(channels));
        };

        if self.row_pending {
            self.apply_row(&row, bank, channels);
            self.row_pending = false;
        }
        self.step_ramps(bank, channels);

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.cursor += 1;
            match self.current_row() {
                Some(next) => {
                    self.remaining = next.duration;
                    self.row_pending = true;
                }
                None => return Some(self.finish(channels)),
            }
        }

        None
    }

    fn current_row(&self) -> Option<Keyframe> {
        self.sequence
            .and_then(|seq| seq.get(self.cursor))
            .filter(|row| !row.is_end())
            .copied()
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.remaining = self.current_row().map(|row| row.duration).unwrap_or(0);
        self.row_pending = true;
        self.ramps = [None; MAX_CHANNELS];
    }

    fn apply_row(&mut self, row: &Keyframe, bank: &ServoBank, channels: &mut ChannelTable) {
        for id in 1..=channels.len() {
            let Some(width) = row.target(id).width(self.positions) else {
                continue;
            };
            let Some(channel) = channels.get_mut(id) else {
                continue;
            };
            if channel.mode == OwnerMode::RcTracking {
                continue;
            }
            if channel.mode != OwnerMode::Sequencer {
                channel.set_mode(OwnerMode::Sequencer);
            }

            let slot = &mut self.ramps[id as usize - 1];
            let rate = self.speed.rate(id);
            if width == NO_PULSE || rate == 0 || bank.read(id) == NO_PULSE {
                bank.set(id, width);
                *slot = None;
            } else {
                *slot = Some(width);
            }
        }
    }

    fn step_ramps(&mut self, bank: &ServoBank, channels: &ChannelTable) {
        for (index, slot) in self.ramps.iter_mut().enumerate() {
            let Some(target) = *slot else {
                continue;
            };
            let id = index as u8 + 1;
            if channels.mode(id) != OwnerMode::Sequencer {
                *slot = None;
                continue;
            }

            let current = bank.read(id);
            let next = if current == NO_PULSE {
                target
            } else {
                ramp(current, target, self.speed.rate(id))
            };
            bank.set(id, next);

            // Clipping can leave the target out of reach
            if bank.read(id) == current || next == target {
                *slot = None;
            }
        }
    }

    /// Release sequencer channels with no ramp left to run
    fn release_settled(&self, channels: &mut ChannelTable) {
        for (id, channel) in channels.iter_mut() {
            if channel.mode == OwnerMode::Sequencer && self.ramps[id as usize - 1].is_none() {
                channel.set_mode(OwnerMode::Idle);
            }
        }
    }

    fn finish(&mut self, channels: &mut ChannelTable) -> SequencerEvent {
        self.state = SequencerState::Idle;
        let ramps = self.ramps;
        self.rewind();
        self.ramps = ramps;
        self.release_settled(channels);
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
        SequencerEvent::Finished
    }
}
