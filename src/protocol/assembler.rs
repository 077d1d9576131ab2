//! Client-side frame reassembly.
//!
//! The transport may split one server line across several reads or pack many
//! lines into one read. [`FrameAssembler`] hides that: bytes go in, whole
//! decoded [`Frame`]s come out.

use super::frame::Frame;
use super::frame_buffer::LineBuffer;
use super::wire_format::DEFAULT_MAX_FRAME_LINE;
use crate::error::Result;

/// Accumulates raw bytes into complete protocol frames.
pub struct FrameAssembler {
    lines: LineBuffer,
}

impl FrameAssembler {
    /// Create an assembler with the default maximum frame length.
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME_LINE)
    }

    /// Create an assembler with a custom maximum frame length.
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            lines: LineBuffer::with_max_line(max_frame),
        }
    }

    /// Feed bytes from one read and return every frame they complete.
    ///
    /// An incomplete trailing line is kept for the next call.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.lines
            .push(data)?
            .iter()
            .map(|line| Frame::decode(line))
            .collect()
    }

    /// True if part of a frame is buffered but not yet terminated.
    pub fn has_partial(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Number of buffered bytes.
    pub fn buffered(&self) -> usize {
        self.lines.len()
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
