//! Client-side pull loop.
//!
//! A [`SessionDriver`] walks the store page by page over one connection:
//! 1. Send `offset\n`
//! 2. Read and assemble frames until the page holds `k` words or a sentinel
//!    arrives
//! 3. Fold the words into its [`FrequencyTable`]
//! 4. Stop on a sentinel, otherwise advance `offset` by `k` and repeat
//!
//! # Example
//!
//! ```ignore
//! use wordfeed::SessionDriver;
//!
//! let report = SessionDriver::new(1, 10)?.run(addr, Path::new("out")).await;
//! println!("{} words, truncated: {}", report.tokens_received, report.is_truncated());
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Result, WordfeedError};
use crate::frequency::FrequencyTable;
use crate::protocol::{encode_request, Frame, FrameAssembler, Sentinel, DEFAULT_MAX_FRAME_LINE};

/// Size of the socket read buffer. Frames may be larger; they span reads.
pub const READ_BUFFER_SIZE: usize = 4096;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The server signalled the end of the store.
    Completed(Sentinel),
    /// The connection failed or closed before a sentinel.
    Truncated(String),
}

/// Result of one client session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub client_id: u32,
    pub table: FrequencyTable,
    /// Non-sentinel words received.
    pub tokens_received: u64,
    /// Pages that delivered at least one word.
    pub pages: u64,
    pub outcome: SessionOutcome,
    pub elapsed: Duration,
    /// Where the table was written, if it was.
    pub artifact: Option<PathBuf>,
}

impl SessionReport {
    /// True if the session ended without a sentinel.
    pub fn is_truncated(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Truncated(_))
    }
}

/// Drives one client session.
#[derive(Debug, Clone)]
pub struct SessionDriver {
    client_id: u32,
    page_size: usize,
    max_frame: usize,
}

impl SessionDriver {
    /// Create a driver for client `client_id` expecting pages of `page_size`.
    ///
    /// A zero page size is a configuration error.
    pub fn new(client_id: u32, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(WordfeedError::Config("k (page size) must be positive".into()));
        }
        Ok(Self {
            client_id,
            page_size,
            max_frame: DEFAULT_MAX_FRAME_LINE,
        })
    }

    /// Set the largest frame the assembler will buffer.
    pub fn with_max_frame(mut self, max_frame: usize) -> Self {
        self.max_frame = max_frame;
        self
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    /// Artifact file for this client inside `output_dir`.
    pub fn artifact_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("output{}.txt", self.client_id))
    }

    /// Connect to `addr`, run the session, and persist the table.
    ///
    /// Never fails: connection problems produce a truncated report, and the
    /// (possibly partial) table is written regardless.
    pub async fn run(&self, addr: SocketAddr, output_dir: &Path) -> SessionReport {
        let started = Instant::now();
        let mut report = match TcpStream::connect(addr).await {
            Ok(stream) => {
                tracing::info!(client = self.client_id, %addr, "Connected to server");
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(client = self.client_id, error = %e, "Cannot set TCP_NODELAY");
                }
                self.drive(stream).await
            }
            Err(e) => {
                tracing::error!(client = self.client_id, %addr, error = %e, "Connection failed");
                SessionReport {
                    client_id: self.client_id,
                    table: FrequencyTable::new(),
                    tokens_received: 0,
                    pages: 0,
                    outcome: SessionOutcome::Truncated(format!("connect to {} failed: {}", addr, e)),
                    elapsed: started.elapsed(),
                    artifact: None,
                }
            }
        };

        let path = self.artifact_path(output_dir);
        match report.table.persist(&path) {
            Ok(()) => {
                tracing::info!(
                    client = self.client_id,
                    path = %path.display(),
                    "Word frequencies written"
                );
                report.artifact = Some(path);
            }
            Err(e) => {
                tracing::error!(
                    client = self.client_id,
                    path = %path.display(),
                    error = %e,
                    "Cannot write word frequencies"
                );
            }
        }

        report
    }

    /// Run the pull loop over an established stream.
    pub async fn drive<S>(&self, mut stream: S) -> SessionReport
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let started = Instant::now();
        let mut session = PageReader::new(self.page_size, self.max_frame);
        let mut offset: u64 = 0;

        let outcome = loop {
            if let Err(e) = stream.write_all(&encode_request(offset)).await {
                break SessionOutcome::Truncated(format!("request for offset {} failed: {}", offset, e));
            }
            tracing::debug!(client = self.client_id, offset, "Sent request");

            match session.read_page(&mut stream).await {
                Ok(None) => {
                    offset += self.page_size as u64;
                }
                Ok(Some(sentinel)) => {
                    tracing::debug!(client = self.client_id, sentinel = sentinel.as_str(), "Sentinel received");
                    break SessionOutcome::Completed(sentinel);
                }
                Err(e) => {
                    tracing::warn!(client = self.client_id, offset, error = %e, "Session truncated");
                    break SessionOutcome::Truncated(e.to_string());
                }
            }
        };

        let _ = stream.shutdown().await;

        let report = SessionReport {
            client_id: self.client_id,
            tokens_received: session.tokens,
            pages: session.pages,
            table: session.table,
            outcome,
            elapsed: started.elapsed(),
            artifact: None,
        };

        tracing::info!(
            client = self.client_id,
            words = report.tokens_received,
            distinct = report.table.len(),
            pages = report.pages,
            elapsed_ms = report.elapsed.as_millis() as u64,
            truncated = report.is_truncated(),
            "Session finished"
        );
        report
    }
}

/// Per-session read state: assembler, read buffer and running totals.
struct PageReader {
    page_size: usize,
    assembler: FrameAssembler,
    buf: Vec<u8>,
    table: FrequencyTable,
    tokens: u64,
    pages: u64,
}

impl PageReader {
    fn new(page_size: usize, max_frame: usize) -> Self {
        Self {
            page_size,
            assembler: FrameAssembler::with_max_frame(max_frame),
            buf: vec![0u8; READ_BUFFER_SIZE],
            table: FrequencyTable::new(),
            tokens: 0,
            pages: 0,
        }
    }

    /// Read one page.
    ///
    /// Completion is decided by words counted for this logical page, never by
    /// how many arrived in a single read.
    ///
    /// - `Ok(None)`: `k` words received, more pages may follow
    /// - `Ok(Some(sentinel))`: the session is over
    /// - `Err(..)`: transport failure, early close, or a rejected request
    async fn read_page<S>(&mut self, stream: &mut S) -> Result<Option<Sentinel>>
    where
        S: AsyncRead + Unpin,
    {
        let mut page_tokens = 0usize;

        loop {
            let n = stream.read(&mut self.buf).await?;
            if n == 0 {
                if page_tokens == 0 && !self.assembler.has_partial() {
                    tracing::debug!("Empty response, peer closed the connection");
                }
                return Err(WordfeedError::ConnectionClosed);
            }

            let mut sentinel = None;
            for frame in self.assembler.push(&self.buf[..n])? {
                match frame {
                    Frame::Rejected(message) => {
                        return Err(WordfeedError::Protocol(format!(
                            "server rejected request: {}",
                            message
                        )));
                    }
                    Frame::Batch(batch) => {
                        let counted = self.table.record_all(&batch.tokens);
                        self.tokens += counted;
                        page_tokens += counted as usize;
                        if batch.sentinel.is_some() {
                            sentinel = batch.sentinel;
                        }
                    }
                }
            }

            if sentinel.is_some() || page_tokens >= self.page_size {
                if page_tokens > 0 {
                    self.pages += 1;
                }
                return Ok(sentinel);
            }
        }
    }
}
