//! RC input capture monitor
//!
//! Measures one external RC pulse per frame. Sampling is only possible
//! through a [`CaptureWindow`], which the pulse train hands out when it
//! enters its pause phase, so the capture never overlaps pulse generation.
//!
//! Each completed window either yields a valid width or counts as a bad
//! sample. After `threshold` consecutive bad samples the monitor reports
//! [`RcReading::SignalLost`] until a good sample arrives.

use portable_atomic::{AtomicI16, AtomicU16, AtomicU8, Ordering};

/// Default consecutive bad samples before the signal is lost
pub const DEFAULT_BAD_SAMPLE_THRESHOLD: u8 = 10;

/// Default shortest valid RC pulse (µs)
pub const DEFAULT_MIN_VALID_US: u16 = 800;

/// Default longest valid RC pulse (µs)
pub const DEFAULT_MAX_VALID_US: u16 = 2200;

/// Result of reading the RC input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RcReading {
    /// Last valid pulse width (µs)
    Pulse(u16),
    /// Too many consecutive failed captures
    SignalLost,
}

impl RcReading {
    /// Width if the signal is present
    pub fn width(self) -> Option<u16> {
        match self {
            RcReading::Pulse(w) => Some(w),
            RcReading::SignalLost => None,
        }
    }
}

/// Capture opportunity for one pause phase
///
/// Holds at most one measured pulse: the first complete high period that
/// began after the pause started. Later pulses in the same pause are
/// ignored, as is any width longer than the pause itself.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureWindow {
    length_us: u32,
    width_us: Option<u32>,
}

impl CaptureWindow {
    pub(crate) const fn new(length_us: u32) -> Self {
        Self {
            length_us,
            width_us: None,
        }
    }

    /// Length of the pause (µs)
    pub fn length_us(&self) -> u32 {
        self.length_us
    }

    /// Record a measured high time
    pub fn record_width(&mut self, width_us: u32) {
        if self.width_us.is_none() && width_us > 0 && width_us <= self.length_us {
            self.width_us = Some(width_us);
        }
    }

    /// Measured width, if a complete pulse was seen
    pub fn width_us(&self) -> Option<u32> {
        self.width_us
    }
}

/// Shared RC input state
///
/// Written from the interrupt context by [`complete`](Self::complete), read
/// from the main loop by [`read`](Self::read).
#[derive(Debug)]
pub struct RcMonitor {
    last_good: AtomicI16,
    bad_samples: AtomicU8,
    threshold: AtomicU8,
    min_valid_us: AtomicU16,
    max_valid_us: AtomicU16,
}

impl Default for RcMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl RcMonitor {
    /// Create a monitor that reports signal lost until the first valid sample
    pub const fn new() -> Self {
        Self {
            last_good: AtomicI16::new(0),
            bad_samples: AtomicU8::new(DEFAULT_BAD_SAMPLE_THRESHOLD),
            threshold: AtomicU8::new(DEFAULT_BAD_SAMPLE_THRESHOLD),
            min_valid_us: AtomicU16::new(DEFAULT_MIN_VALID_US),
            max_valid_us: AtomicU16::new(DEFAULT_MAX_VALID_US),
        }
    }

    /// Apply the threshold and valid window
    ///
    /// Resets the monitor to the signal-lost state.
    pub fn configure(&self, threshold: u8, min_valid_us: u16, max_valid_us: u16) {
        let threshold = threshold.max(1);
        self.threshold.store(threshold, Ordering::Relaxed);
        self.min_valid_us.store(min_valid_us, Ordering::Relaxed);
        self.max_valid_us.store(max_valid_us, Ordering::Relaxed);
        self.bad_samples.store(threshold, Ordering::Release);
    }

    /// Evaluate a finished capture window
    ///
    /// Returns the accepted width, or `None` if the sample was bad.
    pub fn complete(&self, window: CaptureWindow) -> Option<u16> {
        let min = self.min_valid_us.load(Ordering::Relaxed) as u32;
        let max = self.max_valid_us.load(Ordering::Relaxed) as u32;

        match window.width_us().filter(|w| (min..=max).contains(w)) {
            Some(width) => {
                // Value first, then clear the counter that gates it
                self.last_good.store(width as i16, Ordering::Relaxed);
                self.bad_samples.store(0, Ordering::Release);
                Some(width as u16)
            }
            None => {
                let threshold = self.threshold.load(Ordering::Relaxed);
                let bad = self.bad_samples.load(Ordering::Relaxed);
                if bad < threshold {
                    self.bad_samples.store(bad + 1, Ordering::Release);
                }
                None
            }
        }
    }

    /// Latest RC reading
    pub fn read(&self) -> RcReading {
        let bad = self.bad_samples.load(Ordering::Acquire);
        if bad >= self.threshold.load(Ordering::Relaxed) {
            RcReading::SignalLost
        } else {
            RcReading::Pulse(self.last_good.load(Ordering::Relaxed) as u16)
        }
    }

    /// Consecutive bad samples (saturates at the threshold)
    pub fn bad_samples(&self) -> u8 {
        self.bad_samples.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(width: u32) -> CaptureWindow {
        let mut window = CaptureWindow::new(4000);
        window.record_width(width);
        window
    }

    fn empty() -> CaptureWindow {
        CaptureWindow::new(4000)
    }

    #[test]
    fn test_signal_lost_before_first_sample() {
        let monitor = RcMonitor::new();
        assert_eq!(monitor.read(), RcReading::SignalLost);
    }

    #[test]
    fn test_valid_sample() {
        let monitor = RcMonitor::new();
        assert_eq!(monitor.complete(sample(1500)), Some(1500));
        assert_eq!(monitor.read(), RcReading::Pulse(1500));
        assert_eq!(monitor.bad_samples(), 0);
    }

    #[test]
    fn test_threshold_reached_exactly() {
        let monitor = RcMonitor::new();
        monitor.complete(sample(1200));

        for _ in 0..(DEFAULT_BAD_SAMPLE_THRESHOLD - 1) {
            monitor.complete(empty());
            assert_eq!(monitor.read(), RcReading::Pulse(1200));
        }

        monitor.complete(empty());
        assert_eq!(monitor.read(), RcReading::SignalLost);
    }

    #[test]
    fn test_next_good_sample_clears_loss() {
        let monitor = RcMonitor::new();
        monitor.configure(3, 800, 2200);
        for _ in 0..5 {
            monitor.complete(empty());
        }
        assert_eq!(monitor.read(), RcReading::SignalLost);
        assert_eq!(monitor.bad_samples(), 3);

        monitor.complete(sample(1900));
        assert_eq!(monitor.read(), RcReading::Pulse(1900));
    }

    #[test]
    fn test_out_of_window_width_is_bad() {
        let monitor = RcMonitor::new();
        monitor.complete(sample(1500));
        assert_eq!(monitor.complete(sample(500)), None);
        assert_eq!(monitor.complete(sample(2500)), None);
        assert_eq!(monitor.bad_samples(), 2);
        assert_eq!(monitor.read(), RcReading::Pulse(1500));
    }

    #[test]
    fn test_window_keeps_first_pulse() {
        let mut window = CaptureWindow::new(3000);
        assert_eq!(window.width_us(), None);
        window.record_width(1000);
        window.record_width(1400);
        assert_eq!(window.width_us(), Some(1000));
    }

    #[test]
    fn test_window_rejects_impossible_widths() {
        // Longer than the pause it was seen in
        let mut window = CaptureWindow::new(3000);
        window.record_width(3500);
        assert_eq!(window.width_us(), None);

        // Counter never left zero
        window.record_width(0);
        assert_eq!(window.width_us(), None);

        window.record_width(1500);
        assert_eq!(window.width_us(), Some(1500));
    }

    #[test]
    fn test_reading_width() {
        assert_eq!(RcReading::Pulse(1234).width(), Some(1234));
        assert_eq!(RcReading::SignalLost.width(), None);
    }
}
