//! Error types for wordfeed.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for all wordfeed operations.
#[derive(Debug, Error)]
pub enum WordfeedError {
    /// I/O error during socket or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON deserialization error (configuration file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration is present but unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Corpus document could not be read.
    #[error("Cannot read corpus {}: {source}", path.display())]
    Corpus {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listening socket could not be bound.
    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Protocol error (invalid frame, non-UTF-8 line, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A line grew past the configured maximum without a newline.
    #[error("Line of {len} bytes exceeds maximum {max}")]
    LineTooLong { len: usize, max: usize },

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// A request line that is not a base-10 non-negative offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid offset: {reason}")]
pub struct OffsetParseError {
    /// The offending request text, lossily decoded.
    pub input: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Result type alias using WordfeedError.
pub type Result<T> = std::result::Result<T, WordfeedError>;
