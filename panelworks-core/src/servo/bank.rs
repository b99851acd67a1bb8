//! Shared commanded-width table

use portable_atomic::{AtomicBool, AtomicI16, AtomicU8, Ordering};

use super::{clip_width, MAX_CHANNELS, NO_PULSE, PULSE_MAX_US, PULSE_MIN_US};

/// Commanded pulse widths for every channel
///
/// Every field is a single atomic word, so the interrupt context can read a
/// width while the main loop writes it without tearing. Channel ids are
/// one-based (`1..=channel_count`); ids outside that range are ignored.
#[derive(Debug)]
pub struct ServoBank {
    widths: [AtomicI16; MAX_CHANNELS],
    channel_count: AtomicU8,
    min_us: AtomicI16,
    max_us: AtomicI16,
    running: AtomicBool,
}

impl Default for ServoBank {
    fn default() -> Self {
        Self::new()
    }
}

impl ServoBank {
    /// Create a stopped bank with every channel silent
    pub const fn new() -> Self {
        Self {
            widths: [const { AtomicI16::new(NO_PULSE) }; MAX_CHANNELS],
            channel_count: AtomicU8::new(MAX_CHANNELS as u8),
            min_us: AtomicI16::new(PULSE_MIN_US),
            max_us: AtomicI16::new(PULSE_MAX_US),
            running: AtomicBool::new(false),
        }
    }

    /// Apply the channel count and pulse limits
    ///
    /// Called once at startup, before [`start`](Self::start). Limits are
    /// held inside the legal pulse range; an inverted pair falls back to
    /// the full range.
    pub fn configure(&self, channel_count: u8, min_us: u16, max_us: u16) {
        let legal = |us: u16| (us.min(PULSE_MAX_US as u16) as i16).max(PULSE_MIN_US);
        let (min, max) = match (legal(min_us), legal(max_us)) {
            (min, max) if min <= max => (min, max),
            _ => (PULSE_MIN_US, PULSE_MAX_US),
        };

        let count = channel_count.min(MAX_CHANNELS as u8);
        self.channel_count.store(count, Ordering::Relaxed);
        self.min_us.store(min, Ordering::Relaxed);
        self.max_us.store(max, Ordering::Relaxed);
    }

    /// Number of active channels
    pub fn channel_count(&self) -> u8 {
        self.channel_count.load(Ordering::Relaxed)
    }

    fn slot(&self, channel: u8) -> Option<&AtomicI16> {
        if channel == 0 || channel > self.channel_count() {
            return None;
        }
        self.widths.get(channel as usize - 1)
    }

    /// Command a channel's pulse width
    ///
    /// The width is clipped into the configured limits. [`NO_PULSE`] or any
    /// negative value silences the channel. The value is picked up the next
    /// time the pulse train reaches this channel's slot.
    pub fn set(&self, channel: u8, width: i16) {
        if let Some(slot) = self.slot(channel) {
            let min = self.min_us.load(Ordering::Relaxed);
            let max = self.max_us.load(Ordering::Relaxed);
            slot.store(clip_width(width, min, max), Ordering::Release);
        }
    }

    /// Last commanded (clipped) width, or [`NO_PULSE`]
    ///
    /// Unknown channels read as [`NO_PULSE`].
    pub fn read(&self, channel: u8) -> i16 {
        self.slot(channel)
            .map(|slot| slot.load(Ordering::Acquire))
            .unwrap_or(NO_PULSE)
    }

    /// Begin generating frames (idempotent)
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Stop all output, including RC capture
    ///
    /// Commanded widths are kept and resume on the next [`start`](Self::start).
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Check if frames are being generated
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_bank_is_silent_and_stopped() {
        let bank = ServoBank::new();
        assert!(!bank.is_running());
        for ch in 1..=MAX_CHANNELS as u8 {
            assert_eq!(bank.read(ch), NO_PULSE);
        }
    }

    #[test]
    fn test_set_and_read() {
        let bank = ServoBank::new();
        bank.set(1, 1200);
        bank.set(12, 1800);
        assert_eq!(bank.read(1), 1200);
        assert_eq!(bank.read(12), 1800);
    }

    #[test]
    fn test_out_of_range_channel_is_noop() {
        let bank = ServoBank::new();
        bank.set(0, 1500);
        bank.set(13, 1500);
        assert_eq!(bank.read(0), NO_PULSE);
        assert_eq!(bank.read(13), NO_PULSE);
    }

    #[test]
    fn test_configured_channel_count_limits_ids() {
        let bank = ServoBank::new();
        bank.configure(4, 600, 2400);
        bank.set(5, 1500);
        assert_eq!(bank.read(5), NO_PULSE);

        bank.set(4, 3000);
        assert_eq!(bank.read(4), 2400);
        bank.set(4, 0);
        assert_eq!(bank.read(4), 600);
    }

    #[test]
    fn test_configure_keeps_limits_legal() {
        let bank = ServoBank::new();
        bank.configure(2, 2000, 1000);
        bank.set(1, 1500);
        assert_eq!(bank.read(1), 1500);
        bank.set(1, 9000);
        assert_eq!(bank.read(1), PULSE_MAX_US);

        bank.configure(2, 100, 60_000);
        bank.set(2, 0);
        assert_eq!(bank.read(2), PULSE_MIN_US);
        bank.set(2, i16::MAX);
        assert_eq!(bank.read(2), PULSE_MAX_US);
    }

    #[test]
    fn test_start_stop() {
        let bank = ServoBank::new();
        bank.set(2, 1500);
        bank.start();
        bank.start();
        assert!(bank.is_running());
        bank.stop();
        assert!(!bank.is_running());
        assert_eq!(bank.read(2), 1500);
    }

    proptest! {
        #[test]
        fn prop_set_read_clips(width in any::<i16>(), channel in 1u8..=12) {
            let bank = ServoBank::new();
            bank.set(channel, width);
            let expected = if width < 0 {
                NO_PULSE
            } else if width < PULSE_MIN_US {
                PULSE_MIN_US
            } else if width > PULSE_MAX_US {
                PULSE_MAX_US
            } else {
                width
            };
            prop_assert_eq!(bank.read(channel), expected);
        }
    }
}
