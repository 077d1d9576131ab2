//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the line-framed text protocol:
//! - request lines and batch/sentinel/error frames
//! - line buffer for accumulating partial reads
//! - frame assembler that turns raw reads into decoded frames

mod assembler;
mod frame;
mod frame_buffer;
mod wire_format;

pub use assembler::FrameAssembler;
pub use frame::{Batch, Frame};
pub use frame_buffer::LineBuffer;
pub use wire_format::{
    encode_batch, encode_batch_into, encode_error, encode_out_of_range, encode_request,
    is_sentinel, parse_request, Sentinel, DEFAULT_MAX_FRAME_LINE, EOF_SENTINEL, ERROR_PREFIX,
    LINE_TERMINATOR, MAX_REQUEST_LINE, OUT_OF_RANGE_SENTINEL, TOKEN_DELIMITER,
};
