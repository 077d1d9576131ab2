//! Wire format encoding and decoding.
//!
//! The protocol is ASCII text, one frame per line:
//! ```text
//! client -> server   <offset>\n
//! server -> client   tok,tok,...,tok,\n          (at most p tokens)
//!                    tok,tok,...,tok,EOF\n       (last frame, store exhausted)
//!                    $$\n                        (offset out of range)
//!                    ERR <message>\n             (malformed request)
//! ```
//!
//! There is no length prefix. Termination of a page is signalled only by the
//! `EOF` and `$$` sentinels, or by the client having counted `k` tokens.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::OffsetParseError;

/// Line terminator for every frame and request.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Separator between tokens inside a batch frame.
pub const TOKEN_DELIMITER: u8 = b',';

/// Appended to the final frame of a page that reaches the end of the store.
pub const EOF_SENTINEL: &str = "EOF";

/// Sole content of the reply to an out-of-range offset.
pub const OUT_OF_RANGE_SENTINEL: &str = "$$";

/// Prefix of an error frame.
pub const ERROR_PREFIX: &str = "ERR ";

/// Longest request line the server will buffer (u64::MAX has 20 digits).
pub const MAX_REQUEST_LINE: usize = 64;

/// Default upper bound for a server frame buffered by the client (16 MB).
pub const DEFAULT_MAX_FRAME_LINE: usize = 16 * 1024 * 1024;

/// Out-of-band markers carried in-band with ordinary tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// `EOF`: the store is exhausted.
    Eof,
    /// `$$`: the requested offset was past the end of the store.
    OutOfRange,
}

impl Sentinel {
    /// Match a trimmed token against the sentinel literals.
    pub fn from_token(token: &str) -> Option<Sentinel> {
        match token {
            EOF_SENTINEL => Some(Sentinel::Eof),
            OUT_OF_RANGE_SENTINEL => Some(Sentinel::OutOfRange),
            _ => None,
        }
    }

    /// The literal as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Sentinel::Eof => EOF_SENTINEL,
            Sentinel::OutOfRange => OUT_OF_RANGE_SENTINEL,
        }
    }
}

/// Check whether a token is one of the reserved sentinels.
#[inline]
pub fn is_sentinel(token: &str) -> bool {
    Sentinel::from_token(token).is_some()
}

/// Encode a request line for `offset`.
pub fn encode_request(offset: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(21);
    buf.put_slice(offset.to_string().as_bytes());
    buf.put_u8(LINE_TERMINATOR);
    buf.freeze()
}

/// Parse a request line (newline already stripped) into an offset.
///
/// Surrounding whitespace, including a trailing `\r`, is ignored.
pub fn parse_request(line: &[u8]) -> std::result::Result<u64, OffsetParseError> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(OffsetParseError {
            input: text.into_owned(),
            reason: "empty request".to_string(),
        });
    }

    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OffsetParseError {
            input: text.into_owned(),
            reason: "not a non-negative base-10 integer".to_string(),
        });
    }

    trimmed.parse::<u64>().map_err(|e| OffsetParseError {
        input: text.to_string(),
        reason: e.to_string(),
    })
}

/// Append one batch frame to `dst`.
///
/// Every token is followed by a comma; `eof` appends the `EOF` sentinel
/// before the newline.
pub fn encode_batch_into<S: AsRef<str>>(tokens: &[S], eof: bool, dst: &mut BytesMut) {
    let needed: usize = tokens.iter().map(|t| t.as_ref().len() + 1).sum::<usize>()
        + if eof { EOF_SENTINEL.len() } else { 0 }
        + 1;
    dst.reserve(needed);

    for token in tokens {
        dst.put_slice(token.as_ref().as_bytes());
        dst.put_u8(TOKEN_DELIMITER);
    }
    if eof {
        dst.put_slice(EOF_SENTINEL.as_bytes());
    }
    dst.put_u8(LINE_TERMINATOR);
}

/// Encode one batch frame.
pub fn encode_batch<S: AsRef<str>>(tokens: &[S], eof: bool) -> Bytes {
    let mut buf = BytesMut::new();
    encode_batch_into(tokens, eof, &mut buf);
    buf.freeze()
}

/// The `$$\n` frame.
pub fn encode_out_of_range() -> Bytes {
    Bytes::from_static(b"$$\n")
}

/// An `ERR <message>\n` frame. Newlines inside the message are flattened.
pub fn encode_error(message: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(ERROR_PREFIX.len() + message.len() + 1);
    buf.put_slice(ERROR_PREFIX.as_bytes());
    for b in message.bytes() {
        buf.put_u8(if b == LINE_TERMINATOR || b == b'\r' { b' ' } else { b });
    }
    buf.put_u8(LINE_TERMINATOR);
    buf.freeze()
}
