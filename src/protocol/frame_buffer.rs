//! Line buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` so that a line split across reads, or many lines
//! arriving in one read, are handled without assuming anything about how the
//! transport chunks the stream.
//!
//! # Example
//!
//! ```
//! use wordfeed::protocol::LineBuffer;
//!
//! let mut buffer = LineBuffer::new();
//!
//! assert!(buffer.push(b"a,b").unwrap().is_empty());
//! let lines = buffer.push(b",\nc,\nd").unwrap();
//! assert_eq!(lines.len(), 2);
//! assert_eq!(&lines[0][..], b"a,b,");
//! assert_eq!(buffer.len(), 1);
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{DEFAULT_MAX_FRAME_LINE, LINE_TERMINATOR};
use crate::error::{Result, WordfeedError};

/// State machine for line extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Collecting bytes of the current line.
    Accumulating,
    /// The current line overflowed; drop bytes up to and including the next newline.
    Discarding,
}

/// Buffer for accumulating incoming bytes and extracting complete lines.
pub struct LineBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known to contain no newline.
    scanned: usize,
    /// Current parsing state.
    state: State,
    /// Maximum allowed line length, newline excluded.
    max_line: usize,
}

impl LineBuffer {
    /// Create a new line buffer with default settings.
    ///
    /// Default capacity: 4KB, max line: 16MB.
    pub fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_FRAME_LINE)
    }

    /// Create a new line buffer with a custom max line length.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            scanned: 0,
            state: State::Accumulating,
            max_line,
        }
    }

    /// Push data into the buffer and extract all complete lines.
    ///
    /// Returned lines have the trailing newline stripped. An incomplete
    /// trailing line stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns `LineTooLong` if a line grows past the maximum. Lines that
    /// completed earlier in the same push are lost with it; callers that must
    /// keep them use [`extend`](Self::extend) and [`next_line`](Self::next_line).
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.extend(data);

        let mut lines = Vec::new();
        while let Some(line) = self.next_line()? {
            lines.push(line);
        }

        Ok(lines)
    }

    /// Append data to the buffer without extracting lines.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete line, if any.
    ///
    /// - `Ok(Some(line))` if a complete line was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(LineTooLong)` if the current line overflowed; its bytes are
    ///   dropped through the next newline and later lines remain available
    pub fn next_line(&mut self) -> Result<Option<Bytes>> {
        loop {
            let found = self.buffer[self.scanned..]
                .iter()
                .position(|&b| b == LINE_TERMINATOR)
                .map(|pos| self.scanned + pos);

            match (self.state, found) {
                (State::Discarding, Some(end)) => {
                    let _ = self.buffer.split_to(end + 1);
                    self.scanned = 0;
                    self.state = State::Accumulating;
                }
                (State::Discarding, None) => {
                    self.buffer.clear();
                    self.scanned = 0;
                    return Ok(None);
                }
                (State::Accumulating, Some(end)) => {
                    self.scanned = 0;
                    if end > self.max_line {
                        let _ = self.buffer.split_to(end + 1);
                        return Err(self.overflow(end));
                    }
                    let mut line = self.buffer.split_to(end + 1);
                    line.truncate(end);
                    return Ok(Some(line.freeze()));
                }
                (State::Accumulating, None) => {
                    self.scanned = self.buffer.len();
                    if self.scanned > self.max_line {
                        let len = self.scanned;
                        self.buffer.clear();
                        self.scanned = 0;
                        self.state = State::Discarding;
                        return Err(self.overflow(len));
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn overflow(&self, len: usize) -> WordfeedError {
        WordfeedError::LineTooLong {
            len,
            max: self.max_line,
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any buffered partial line and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.state = State::Accumulating;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::Accumulating => "Accumulating",
            State::Discarding => "Discarding",
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"a,b,\n").unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(&lines[0][..], b"a,b,");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_lines_in_one_push() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"a,\nb,\nc,EOF\n").unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(&lines[0][..], b"a,");
        assert_eq!(&lines[1][..], b"b,");
        assert_eq!(&lines[2][..], b"c,EOF");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_line() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.push(b"hel").unwrap().is_empty());
        assert!(buffer.push(b"lo,wor").unwrap().is_empty());
        assert_eq!(buffer.len(), 9);

        let lines = buffer.push(b"ld,\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(&lines[0][..], b"hello,world,");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = LineBuffer::new();

        let lines = buffer.push(b"first,\nsec").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(&lines[0][..], b"first,");
        assert_eq!(buffer.len(), 3);

        let lines = buffer.push(b"ond,\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(&lines[0][..], b"second,");
    }

    #[test]
    fn test_empty_line() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"\n").unwrap();

        assert_eq!(lines.len(), 1);
        assert!(lines[0].is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = LineBuffer::new();
        let mut all_lines = Vec::new();

        for byte in b"a,b,\n$$\n" {
            all_lines.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_lines.len(), 2);
        assert_eq!(&all_lines[0][..], b"a,b,");
        assert_eq!(&all_lines[1][..], b"$$");
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut buffer = LineBuffer::new();
        let long = vec![b'x'; 100 * 1024];

        assert!(buffer.push(&long).unwrap().is_empty());
        let lines = buffer.push(b"\n").unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 100 * 1024);
    }

    #[test]
    fn test_max_line_validation() {
        let mut buffer = LineBuffer::with_max_line(8);

        let result = buffer.push(b"0123456789");
        assert!(matches!(
            result,
            Err(WordfeedError::LineTooLong { len: 10, max: 8 })
        ));
        assert!(buffer.is_empty());
        assert_eq!(buffer.state_name(), "Discarding");

        // Remainder of the oversized line is dropped, the next line survives.
        let lines = buffer.push(b"abc\n12\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(&lines[0][..], b"12");
        assert_eq!(buffer.state_name(), "Accumulating");
    }

    #[test]
    fn test_overflow_keeps_following_lines() {
        let mut buffer = LineBuffer::with_max_line(4);
        buffer.extend(b"1\n123456\n7\n");

        assert_eq!(&buffer.next_line().unwrap().unwrap()[..], b"1");
        assert!(buffer.next_line().is_err());
        assert_eq!(&buffer.next_line().unwrap().unwrap()[..], b"7");
        assert!(buffer.next_line().unwrap().is_none());
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"partial").unwrap();
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.state_name(), "Accumulating");

        let lines = buffer.push(b"next\n").unwrap();
        assert_eq!(&lines[0][..], b"next");
    }
}
