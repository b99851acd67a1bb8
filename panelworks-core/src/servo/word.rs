//! FIFO words for the PIO pulse program
//!
//! The firmware emits the pulse train from one PIO state machine running at
//! [`PIO_TICK_HZ`]. The servo outputs are a block of consecutive pins and
//! every word the machine pulls holds the block's levels in its low half
//! and a hold count in its high half:
//!
//! ```text
//! .wrap_target
//!     pull block          ; wait for the next word
//!     out pins, 16        ; levels
//!     out x, 16           ; hold count
//! hold:
//!     jmp x--, hold
//!     mov pins, null      ; back to idle
//! .wrap
//! ```
//!
//! A word keeps its levels for `hold + 3` µs and occupies the machine for
//! `hold + 5` µs. Every word ends with the outputs idle, so a late refill
//! stretches the pause and never a pulse.
//!
//! The RC input uses a second machine clocked at [`CAPTURE_TICK_HZ`]. Its
//! count loop takes two cycles, so the value it pushes is the high time in
//! microseconds.

/// Pulse machine clock (one cycle per µs)
pub const PIO_TICK_HZ: u32 = 1_000_000;

/// RC capture machine clock (one count loop per µs)
pub const CAPTURE_TICK_HZ: u32 = 2_000_000;

/// Cycles a word's levels stay up beyond its hold count
const PULSE_OVERHEAD_US: u32 = 3;

/// Cycles a word occupies the machine beyond its hold count
const WORD_OVERHEAD_US: u32 = 5;

/// Idle time between two back-to-back pulses (µs)
pub const SLOT_GAP_US: u32 = WORD_OVERHEAD_US - PULSE_OVERHEAD_US;

/// Largest hold count a word can carry
const MAX_HOLD: u32 = u16::MAX as u32;

/// Longest span one word can cover (µs)
const MAX_SPAN_US: u32 = MAX_HOLD + WORD_OVERHEAD_US;

/// Word raising the output at `index` (zero-based) for `width_us`
pub fn pulse_word(index: u8, width_us: u16) -> u32 {
    let hold = (width_us as u32).saturating_sub(PULSE_OVERHEAD_US);
    (hold << 16) | (1 << (index & 0x0f))
}

/// Words holding every output idle for `pause_us`
///
/// Pauses longer than one word can hold are split. A remainder shorter than
/// [`WORD_OVERHEAD_US`] is folded into the previous word.
pub fn pause_words(pause_us: u32) -> PauseWords {
    PauseWords {
        remaining: pause_us,
    }
}

/// Iterator returned by [`pause_words`]
#[derive(Debug, Clone)]
pub struct PauseWords {
    remaining: u32,
}

impl Iterator for PauseWords {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining < WORD_OVERHEAD_US {
            return None;
        }

        let span = if self.remaining > MAX_SPAN_US {
            MAX_SPAN_US.min(self.remaining - WORD_OVERHEAD_US)
        } else {
            self.remaining
        };
        self.remaining -= span;
        Some((span - WORD_OVERHEAD_US) << 16)
    }
}

/// Clock divider for a machine running at `tick_hz`, as 24.8 fixed-point
/// bits
pub fn clock_divider_bits(sys_clk_hz: u32, tick_hz: u32) -> u32 {
    if tick_hz == 0 {
        return u32::MAX;
    }
    ((sys_clk_hz as u64 * 256) / tick_hz as u64).min(u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    /// Time a word takes on the machine (µs)
    fn span(word: u32) -> u32 {
        (word >> 16) + WORD_OVERHEAD_US
    }

    #[test]
    fn test_pulse_word_layout() {
        let word = pulse_word(0, 1500);
        assert_eq!(word & 0xffff, 0b1);
        assert_eq!((word >> 16) + PULSE_OVERHEAD_US, 1500);

        let word = pulse_word(11, 1000);
        assert_eq!(word & 0xffff, 1 << 11);
        assert_eq!(span(word), 1000 + SLOT_GAP_US);
    }

    #[test]
    fn test_short_pause_is_one_word() {
        let words: Vec<u32> = pause_words(4_000).collect();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0] & 0xffff, 0);
        assert_eq!(span(words[0]), 4_000);
    }

    #[test]
    fn test_long_pause_is_split() {
        let words: Vec<u32> = pause_words(200_000).collect();
        assert_eq!(words.len(), 4);
        assert!(words.iter().all(|w| w & 0xffff == 0));
        assert_eq!(words.iter().map(|w| span(*w)).sum::<u32>(), 200_000);
    }

    #[test]
    fn test_split_never_leaves_a_sliver() {
        let total = MAX_SPAN_US + 2;
        let words: Vec<u32> = pause_words(total).collect();
        assert_eq!(words.len(), 2);
        assert_eq!(words.iter().map(|w| span(*w)).sum::<u32>(), total);
    }

    #[test]
    fn test_clock_divider() {
        assert_eq!(clock_divider_bits(125_000_000, PIO_TICK_HZ), 125 << 8);
        assert_eq!(clock_divider_bits(125_000_000, CAPTURE_TICK_HZ), 62 << 8 | 128);
        assert_eq!(clock_divider_bits(125_000_000, 0), u32::MAX);
    }
}
