//! Pulse train state machine driven by the pulse task

use super::word::SLOT_GAP_US;
use super::{mirror_width, ServoBank, NO_PULSE};
use crate::capture::CaptureWindow;
use crate::config::ServoConfig;

/// Next phase of the frame, as returned by [`PulseTrain::service`]
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Raise `channel` for `width_us`
    Pulse { channel: u8, width_us: u16 },
    /// Hold every output idle for `after_us` and sample the RC input
    /// through `window`
    Pause { after_us: u32, window: CaptureWindow },
    /// The bank is stopped; all outputs stay idle
    Halted,
}

/// Frame generator owned by the pulse task
///
/// Each call to [`service`](Self::service) yields the next slot of the
/// frame. A channel's width is read from the bank once, when its slot is
/// produced, so a value written mid-frame applies to the next frame for a
/// slot that has already been produced.
///
/// Consecutive pulses are separated by [`SLOT_GAP_US`]; the gaps count
/// towards the frame period.
#[derive(Debug, Clone)]
pub struct PulseTrain {
    reversed: bool,
    period_us: u32,
    min_pause_us: u32,
    /// Next slot to emit (zero-based)
    next: u8,
    /// Time used so far in this frame
    elapsed_us: u32,
}

impl PulseTrain {
    /// Create a train from the servo timing configuration
    pub fn new(config: &ServoConfig) -> Self {
        Self {
            reversed: config.reversed,
            period_us: config.period_us,
            min_pause_us: config.min_pause_us,
            next: 0,
            elapsed_us: 0,
        }
    }

    /// Advance to the next phase
    pub fn service(&mut self, bank: &ServoBank) -> Step {
        if !bank.is_running() {
            self.next = 0;
            self.elapsed_us = 0;
            return Step::Halted;
        }

        let count = bank.channel_count();
        while self.next < count {
            let index = self.next;
            self.next += 1;

            let width = bank.read(index + 1);
            if width == NO_PULSE {
                continue;
            }

            let emitted = if self.reversed {
                mirror_width(width)
            } else {
                width
            } as u16;

            self.elapsed_us += emitted as u32 + SLOT_GAP_US;
            return Step::Pulse {
                channel: index + 1,
                width_us: emitted,
            };
        }

        let after_us = self
            .period_us
            .saturating_sub(self.elapsed_us)
            .max(self.min_pause_us);
        self.next = 0;
        self.elapsed_us = 0;

        Step::Pause {
            after_us,
            window: CaptureWindow::new(after_us),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn config(channels: u8) -> ServoConfig {
        let mut config = ServoConfig::default();
        config.pins.truncate(channels as usize);
        config.period_us = 20_000;
        config.min_pause_us = 4_000;
        config
    }

    fn bank(channels: u8) -> ServoBank {
        let bank = ServoBank::new();
        bank.configure(channels, 500, 2500);
        bank
    }

    /// Pulses of one frame as `(channel, width)`, plus the pause length
    fn frame(train: &mut PulseTrain, bank: &ServoBank) -> (Vec<(u8, u16)>, u32) {
        let mut pulses = Vec::new();
        loop {
            match train.service(bank) {
                Step::Pulse { channel, width_us } => pulses.push((channel, width_us)),
                Step::Pause { after_us, .. } => return (pulses, after_us),
                Step::Halted => panic!("bank halted mid-frame"),
            }
        }
    }

    #[test]
    fn test_frame_emits_each_channel_then_pauses() {
        let bank = bank(3);
        bank.set(1, 1000);
        bank.set(2, 1500);
        bank.set(3, 2000);
        bank.start();

        let mut train = PulseTrain::new(&config(3));

        assert!(matches!(
            train.service(&bank),
            Step::Pulse { channel: 1, width_us: 1000 }
        ));
        assert!(matches!(
            train.service(&bank),
            Step::Pulse { channel: 2, width_us: 1500 }
        ));
        assert!(matches!(
            train.service(&bank),
            Step::Pulse { channel: 3, width_us: 2000 }
        ));
        match train.service(&bank) {
            Step::Pause { after_us, window } => {
                assert_eq!(after_us, 20_000 - 4500 - 3 * SLOT_GAP_US);
                assert_eq!(window.length_us(), after_us);
            }
            other => panic!("expected pause, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_fills_period_exactly() {
        let bank = bank(4);
        for ch in 1..=4 {
            bank.set(ch, 1200 + ch as i16 * 100);
        }
        bank.start();

        let mut train = PulseTrain::new(&config(4));
        for _ in 0..3 {
            let (pulses, pause) = frame(&mut train, &bank);
            let busy: u32 = pulses
                .iter()
                .map(|(_, w)| *w as u32 + SLOT_GAP_US)
                .sum();
            assert_eq!(busy + pause, 20_000);
        }
    }

    #[test]
    fn test_silent_channels_are_skipped() {
        let bank = bank(3);
        bank.set(2, 1500);
        bank.start();

        let mut train = PulseTrain::new(&config(3));
        let (pulses, _) = frame(&mut train, &bank);
        assert_eq!(pulses, [(2, 1500)]);
    }

    #[test]
    fn test_pause_never_below_minimum() {
        let bank = bank(12);
        for ch in 1..=12 {
            bank.set(ch, 2500);
        }
        bank.start();

        let mut train = PulseTrain::new(&config(10));
        let (pulses, pause) = frame(&mut train, &bank);
        assert_eq!(pulses.len(), 12);
        assert_eq!(pause, 4_000);
    }

    #[test]
    fn test_write_after_slot_applies_next_frame() {
        let bank = bank(2);
        bank.set(1, 1000);
        bank.set(2, 1000);
        bank.start();

        let mut train = PulseTrain::new(&config(2));

        train.service(&bank); // channel 1 latched at 1000
        bank.set(1, 2000);
        train.service(&bank); // channel 2
        train.service(&bank); // pause

        assert!(matches!(
            train.service(&bank),
            Step::Pulse { channel: 1, width_us: 2000 }
        ));
    }

    #[test]
    fn test_reversed_mirrors_emitted_width() {
        let bank = bank(1);
        bank.set(1, 1000);
        bank.start();

        let mut cfg = config(1);
        cfg.reversed = true;
        let mut train = PulseTrain::new(&cfg);

        assert!(matches!(
            train.service(&bank),
            Step::Pulse { channel: 1, width_us: 2000 }
        ));
        // Commanded value is unchanged
        assert_eq!(bank.read(1), 1000);
    }

    #[test]
    fn test_stop_halts_and_restarts_frame() {
        let bank = bank(2);
        bank.set(1, 1500);
        bank.set(2, 1500);
        bank.start();

        let mut train = PulseTrain::new(&config(2));
        assert!(matches!(train.service(&bank), Step::Pulse { channel: 1, .. }));

        bank.stop();
        assert!(matches!(train.service(&bank), Step::Halted));

        // Restart begins a fresh frame at channel 1
        bank.start();
        assert!(matches!(train.service(&bank), Step::Pulse { channel: 1, .. }));
    }
}
