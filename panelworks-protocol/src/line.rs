//! Line assembly for the command UART.
//!
//! Bytes are accumulated until the `\r` terminator. The buffer is bounded;
//! a line longer than [`MAX_LINE_LEN`] is rejected as a whole rather than
//! truncated, so a garbled command can never be executed as a shorter one.

use heapless::{String, Vec};

/// Maximum command line length (excluding terminator)
pub const MAX_LINE_LEN: usize = 64;

/// Line terminator
pub const LINE_END: u8 = b'\r';

/// A complete command line (terminator stripped)
pub type Line = String<MAX_LINE_LEN>;

/// Errors reported when a terminator closes a bad line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Line exceeded [`MAX_LINE_LEN`] and was discarded
    Overflow,
    /// Line contained bytes that are not valid UTF-8
    InvalidEncoding,
}

/// Byte-at-a-time line builder
#[derive(Debug, Clone, Default)]
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl LineAssembler {
    /// Create an empty assembler
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Discard any partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Number of bytes buffered for the current line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a single byte
    ///
    /// Returns `Ok(Some(line))` when a terminator completes a line,
    /// `Ok(None)` while more bytes are needed. `\n` is ignored so that
    /// terminals sending `\r\n` work unchanged.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Line>, LineError> {
        match byte {
            LINE_END => {
                let overflowed = self.overflowed;
                let result = if overflowed {
                    Err(LineError::Overflow)
                } else {
                    core::str::from_utf8(&self.buffer)
                        .map_err(|_| LineError::InvalidEncoding)
                        .map(|text| {
                            let mut line = Line::new();
                            // Capacity matches the buffer, cannot fail
                            let _ = line.push_str(text);
                            Some(line)
                        })
                };
                self.reset();
                result
            }
            b'\n' => Ok(None),
            _ => {
                if !self.overflowed && self.buffer.push(byte).is_err() {
                    self.overflowed = true;
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(asm: &mut LineAssembler, bytes: &[u8]) -> Result<Option<Line>, LineError> {
        let mut last = Ok(None);
        for &b in bytes {
            last = asm.feed(b);
            if !matches!(last, Ok(None)) {
                return last;
            }
        }
        last
    }

    #[test]
    fn test_simple_line() {
        let mut asm = LineAssembler::new();
        let line = feed_all(&mut asm, b":SE01\r").unwrap().unwrap();
        assert_eq!(line.as_str(), ":SE01");
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn test_crlf_is_accepted() {
        let mut asm = LineAssembler::new();
        let first = feed_all(&mut asm, b":OP01\r").unwrap().unwrap();
        assert_eq!(first.as_str(), ":OP01");
        let second = feed_all(&mut asm, b"\n:CL01\r").unwrap().unwrap();
        assert_eq!(second.as_str(), ":CL01");
    }

    #[test]
    fn test_empty_line() {
        let mut asm = LineAssembler::new();
        let line = asm.feed(LINE_END).unwrap().unwrap();
        assert!(line.is_empty());
    }

    #[test]
    fn test_overflow_rejects_whole_line() {
        let mut asm = LineAssembler::new();
        for _ in 0..(MAX_LINE_LEN + 10) {
            assert_eq!(asm.feed(b'A'), Ok(None));
        }
        assert_eq!(asm.feed(LINE_END), Err(LineError::Overflow));

        // Next line is unaffected
        let line = feed_all(&mut asm, b":ST00\r").unwrap().unwrap();
        assert_eq!(line.as_str(), ":ST00");
    }

    #[test]
    fn test_exactly_full_line_is_kept() {
        let mut asm = LineAssembler::new();
        for _ in 0..MAX_LINE_LEN {
            asm.feed(b'x').unwrap();
        }
        let line = asm.feed(LINE_END).unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_LEN);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut asm = LineAssembler::new();
        asm.feed(0xFF).unwrap();
        assert_eq!(asm.feed(LINE_END), Err(LineError::InvalidEncoding));
    }
}
