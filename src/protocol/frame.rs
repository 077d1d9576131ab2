//! Decoded server frames.
//!
//! A frame is one line of server output. Decoding is lenient:
//! the line is split on commas, each fragment is trimmed, empty fragments are
//! dropped, and sentinels are recognised wherever they appear.
//!
//! # Example
//!
//! ```
//! use wordfeed::protocol::{Frame, Sentinel};
//!
//! let frame = Frame::decode(b"d,e,EOF").unwrap();
//! assert_eq!(frame.tokens(), ["d", "e"]);
//! assert_eq!(frame.sentinel(), Some(Sentinel::Eof));
//! ```

use bytes::Bytes;

use super::wire_format::{
    encode_batch, encode_error, encode_out_of_range, Sentinel, ERROR_PREFIX, TOKEN_DELIMITER,
};
use crate::error::{Result, WordfeedError};

/// A batch of tokens, possibly carrying a sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    /// Non-sentinel tokens in wire order.
    pub tokens: Vec<String>,
    /// Sentinel seen anywhere in the line, if any.
    pub sentinel: Option<Sentinel>,
}

/// A complete server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Ordinary batch, the `EOF`-terminated last batch, or the bare `$$` reply.
    Batch(Batch),
    /// `ERR ...` reply to a malformed request.
    Rejected(String),
}

impl Frame {
    /// Decode one line (newline already stripped).
    ///
    /// Fails only if the line is not valid UTF-8.
    pub fn decode(line: &[u8]) -> Result<Frame> {
        let text = std::str::from_utf8(line)
            .map_err(|e| WordfeedError::Protocol(format!("frame is not UTF-8: {}", e)))?;

        if let Some(message) = text.strip_prefix(ERROR_PREFIX) {
            return Ok(Frame::Rejected(message.trim_end().to_string()));
        }

        let mut batch = Batch::default();
        for fragment in text.split(TOKEN_DELIMITER as char) {
            let token = fragment.trim();
            if token.is_empty() {
                continue;
            }
            match Sentinel::from_token(token) {
                // `$$` wins over `EOF`: either ends the session.
                Some(s) => {
                    if batch.sentinel != Some(Sentinel::OutOfRange) {
                        batch.sentinel = Some(s);
                    }
                }
                None => batch.tokens.push(token.to_string()),
            }
        }

        Ok(Frame::Batch(batch))
    }

    /// Encode this frame back to wire bytes.
    pub fn encode(&self) -> Bytes {
        match self {
            Frame::Rejected(message) => encode_error(message),
            Frame::Batch(batch) => match batch.sentinel {
                Some(Sentinel::OutOfRange) if batch.tokens.is_empty() => encode_out_of_range(),
                sentinel => encode_batch(&batch.tokens, sentinel == Some(Sentinel::Eof)),
            },
        }
    }

    /// Tokens carried by this frame (empty for rejections).
    pub fn tokens(&self) -> &[String] {
        match self {
            Frame::Batch(batch) => &batch.tokens,
            Frame::Rejected(_) => &[],
        }
    }

    /// The sentinel carried by this frame, if any.
    #[inline]
    pub fn sentinel(&self) -> Option<Sentinel> {
        match self {
            Frame::Batch(batch) => batch.sentinel,
            Frame::Rejected(_) => None,
        }
    }

    /// True if this frame ends the session.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.sentinel().is_some()
    }

    /// True if this is an error reply.
    #[inline]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Frame::Rejected(_))
    }
}
