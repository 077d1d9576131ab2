//! Server-side protocol state machine.
//!
//! One [`ProtocolEngine`] serves one connection for its whole lifetime:
//!
//! ```text
//!            ┌──────────────┐  line   ┌────────────────┐ offset >= N ┌────────────┐
//!  ────────► │ AwaitRequest │ ──────► │ ValidateOffset │ ──────────► │ OutOfRange │ ── $$
//!            └──────────────┘         └────────────────┘             └────────────┘
//!              ▲  ▲  │ bad line               │ offset < N                 │
//!              │  │  └── ERR ...              ▼                            │
//!              │  │                     ┌──────────┐                       │
//!              │  └──────────────────── │ EmitPage │ ── batches            │
//!              │                        └──────────┘                       │
//!              └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Peer close, a read/write failure, or server shutdown moves the engine to
//! `Closed`.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::config::PageSettings;
use crate::error::{Result, WordfeedError};
use crate::protocol::{
    encode_batch_into, encode_error, encode_out_of_range, parse_request, LineBuffer,
    MAX_REQUEST_LINE,
};
use crate::store::WordStore;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Size of the socket read buffer.
const READ_BUFFER_SIZE: usize = 1024;

/// How long queued replies may take to flush once shutdown has fired.
pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Engine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for a complete request line.
    AwaitRequest,
    /// A request parsed; checking it against the store length.
    ValidateOffset(u64),
    /// Offset past the end of the store.
    OutOfRange(u64),
    /// Offset inside the store; emitting its page.
    EmitPage(usize),
    /// Connection finished.
    Closed,
}

/// Per-session counters, logged when the session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session number assigned by the connection manager.
    pub session_id: u64,
    /// Request lines received, valid or not.
    pub requests: u64,
    /// Pages emitted (out-of-range replies excluded).
    pub pages_served: u64,
    /// Words sent across all pages.
    pub words_sent: u64,
    /// `$$` replies.
    pub out_of_range: u64,
    /// Malformed requests answered with an error frame.
    pub rejected: u64,
}

/// Server-side session state machine bound to a shared store.
pub struct ProtocolEngine {
    store: WordStore,
    settings: PageSettings,
    state: EngineState,
    summary: SessionSummary,
}

impl ProtocolEngine {
    /// Create an engine for session `session_id`.
    pub fn new(store: WordStore, settings: PageSettings, session_id: u64) -> Self {
        Self {
            store,
            settings,
            state: EngineState::AwaitRequest,
            summary: SessionSummary {
                session_id,
                ..Default::default()
            },
        }
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Counters so far.
    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Run one request line through the state machine.
    ///
    /// Returns the frames to send, in order. The engine is back in
    /// `AwaitRequest` afterwards; a malformed line yields a single error frame.
    pub fn respond(&mut self, line: &[u8]) -> Vec<OutboundFrame> {
        debug_assert_eq!(self.state, EngineState::AwaitRequest);
        self.summary.requests += 1;

        let offset = match parse_request(line) {
            Ok(offset) => offset,
            Err(e) => {
                tracing::warn!(
                    session = self.summary.session_id,
                    input = %e.input,
                    error = %e,
                    "Rejected request"
                );
                self.summary.rejected += 1;
                return vec![OutboundFrame::new(encode_error(&e.to_string()))];
            }
        };
        self.state = EngineState::ValidateOffset(offset);

        let frames = match usize::try_from(offset) {
            Ok(start) if start < self.store.len() => {
                self.state = EngineState::EmitPage(start);
                self.emit_page(start)
            }
            _ => {
                self.state = EngineState::OutOfRange(offset);
                tracing::debug!(
                    session = self.summary.session_id,
                    offset,
                    words = self.store.len(),
                    "Offset exceeds store, sending $$"
                );
                self.summary.out_of_range += 1;
                vec![OutboundFrame::new(encode_out_of_range())]
            }
        };

        self.state = EngineState::AwaitRequest;
        frames
    }

    /// Reply to a request line that overflowed the request buffer.
    pub fn reject_oversized(&mut self, len: usize) -> OutboundFrame {
        self.summary.requests += 1;
        self.summary.rejected += 1;
        tracing::warn!(session = self.summary.session_id, len, "Rejected oversized request");
        OutboundFrame::new(encode_error(&format!(
            "invalid offset: request line of {} bytes exceeds {}",
            len, MAX_REQUEST_LINE
        )))
    }

    /// Partition the page at `start` into batch frames.
    fn emit_page(&mut self, start: usize) -> Vec<OutboundFrame> {
        let page = self.store.slice(start, self.settings.page_size);
        let reaches_end = start + page.len() >= self.store.len();
        let batches = page.len().div_ceil(self.settings.batch_size);

        let mut frames = Vec::with_capacity(batches);
        for (i, batch) in page.chunks(self.settings.batch_size).enumerate() {
            let last = i + 1 == batches;
            let mut buf = BytesMut::new();
            encode_batch_into(batch, last && reaches_end, &mut buf);
            frames.push(OutboundFrame::new(buf.freeze()));
        }

        if reaches_end {
            tracing::debug!(
                session = self.summary.session_id,
                offset = start,
                "End of store reached, sending EOF"
            );
        }

        self.summary.pages_served += 1;
        self.summary.words_sent += page.len() as u64;
        frames
    }

    /// Serve one connection until the peer closes, I/O fails, or `shutdown`
    /// fires.
    ///
    /// Requests are handled strictly in arrival order; all frames of one reply
    /// are queued before the next request line is looked at.
    pub async fn serve<R, W>(
        mut self,
        mut reader: R,
        writer: W,
        shutdown: CancellationToken,
    ) -> Result<SessionSummary>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (handle, mut writer_task) = spawn_writer_task(writer, WriterConfig::default());
        let result = self.read_loop(&mut reader, &handle, &shutdown).await;
        self.state = EngineState::Closed;

        // Let queued replies drain before reporting. A peer that stopped
        // reading gets SHUTDOWN_DRAIN_TIMEOUT after shutdown, then the writer
        // is aborted.
        drop(handle);
        let joined = tokio::select! {
            joined = &mut writer_task => joined,
            _ = shutdown.cancelled() => {
                match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, &mut writer_task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        writer_task.abort();
                        tracing::debug!(
                            session = self.summary.session_id,
                            "Peer not reading, dropped unsent replies on shutdown"
                        );
                        return result.map(|()| self.summary);
                    }
                }
            }
        };
        let flushed = match joined {
            Ok(res) => res,
            Err(e) => Err(WordfeedError::Protocol(format!("writer task failed: {}", e))),
        };

        result.and(flushed).map(|()| self.summary)
    }

    async fn read_loop<R>(
        &mut self,
        reader: &mut R,
        writer: &WriterHandle,
        shutdown: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = LineBuffer::with_max_line(MAX_REQUEST_LINE);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(session = self.summary.session_id, "Session stopped by shutdown");
                    return Ok(());
                }
                read = reader.read(&mut buf) => match read {
                    Ok(0) => return Ok(()), // Connection closed
                    Ok(n) => n,
                    Err(e) => return Err(WordfeedError::Io(e)),
                },
            };

            lines.extend(&buf[..n]);
            loop {
                let frames = match lines.next_line() {
                    Ok(Some(line)) => self.respond(&line),
                    Ok(None) => break,
                    Err(WordfeedError::LineTooLong { len, .. }) => vec![self.reject_oversized(len)],
                    Err(e) => return Err(e),
                };
                for frame in frames {
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            tracing::debug!(
                                session = self.summary.session_id,
                                "Session stopped by shutdown while replying"
                            );
                            return Ok(());
                        }
                        sent = writer.send(frame) => sent?,
                    }
                }
            }
        }
    }
}
