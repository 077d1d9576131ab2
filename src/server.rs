//! Accept loop and per-connection session tasks.
//!
//! The [`ConnectionManager`] owns the listening socket, the shared store and
//! the session counter. Each accepted connection gets its own tokio task
//! running a [`ProtocolEngine`]; tasks are tracked in a `JoinSet` so that
//! shutdown can wait for every session to finish.
//!
//! # Example
//!
//! ```ignore
//! use wordfeed::{ConnectionManager, PageSettings, WordStore};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = WordStore::open("words.txt")?;
//! let manager = ConnectionManager::bind(addr, store, PageSettings::new(10, 3)?).await?;
//! let shutdown = CancellationToken::new();
//! manager.run(shutdown).await?;
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::PageSettings;
use crate::engine::{ProtocolEngine, SessionSummary};
use crate::error::{Result, WordfeedError};
use crate::store::WordStore;

/// Totals reported when the accept loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeStats {
    /// Connections accepted.
    pub sessions: u64,
    /// Sessions that ended with a transport error.
    pub failed_sessions: u64,
    /// Transient accept failures.
    pub accept_errors: u64,
}

/// Listening socket plus the state shared by every session.
pub struct ConnectionManager {
    listener: TcpListener,
    store: WordStore,
    settings: PageSettings,
    session_counter: Arc<AtomicU64>,
}

impl ConnectionManager {
    /// Bind the listening socket.
    ///
    /// A bind failure is fatal for the server process.
    pub async fn bind(addr: SocketAddr, store: WordStore, settings: PageSettings) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| WordfeedError::Bind { addr, source })?;

        tracing::info!(
            addr = %listener.local_addr()?,
            words = store.len(),
            k = settings.page_size,
            p = settings.batch_size,
            "Server listening"
        );

        Ok(Self {
            listener,
            store,
            settings,
            session_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared counter of sessions accepted so far.
    pub fn session_counter(&self) -> Arc<AtomicU64> {
        self.session_counter.clone()
    }

    /// Accept connections until `shutdown` is cancelled, then wait for every
    /// session task to finish.
    pub async fn run(self, shutdown: CancellationToken) -> Result<ServeStats> {
        let mut sessions: JoinSet<Result<SessionSummary>> = JoinSet::new();
        let mut stats = ServeStats::default();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let session_id = self.session_counter.fetch_add(1, Ordering::AcqRel) + 1;
                        stats.sessions += 1;
                        tracing::info!(session = session_id, %peer, "Client connected");
                        sessions.spawn(self.serve_connection(stream, session_id, shutdown.child_token()));
                    }
                    Err(e) => {
                        stats.accept_errors += 1;
                        tracing::error!(error = %e, "Accept failed");
                    }
                },

                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    record_session_end(finished, &mut stats);
                }
            }
        }

        tracing::info!(active = sessions.len(), "Shutting down, waiting for sessions");
        while let Some(finished) = sessions.join_next().await {
            record_session_end(finished, &mut stats);
        }

        tracing::info!(
            sessions = stats.sessions,
            failed = stats.failed_sessions,
            accept_errors = stats.accept_errors,
            "Server stopped"
        );
        Ok(stats)
    }

    fn serve_connection(
        &self,
        stream: TcpStream,
        session_id: u64,
        shutdown: CancellationToken,
    ) -> impl std::future::Future<Output = Result<SessionSummary>> + Send + 'static {
        let engine = ProtocolEngine::new(self.store.clone(), self.settings, session_id);
        async move {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(session = session_id, error = %e, "Cannot set TCP_NODELAY");
            }
            let (reader, writer) = stream.into_split();
            engine.serve(reader, writer, shutdown).await.map_err(|e| {
                tracing::warn!(session = session_id, error = %e, "Session ended with error");
                e
            })
        }
    }
}

fn record_session_end(
    finished: std::result::Result<Result<SessionSummary>, tokio::task::JoinError>,
    stats: &mut ServeStats,
) {
    match finished {
        Ok(Ok(summary)) => {
            tracing::info!(
                session = summary.session_id,
                requests = summary.requests,
                pages = summary.pages_served,
                words = summary.words_sent,
                rejected = summary.rejected,
                "Client disconnected"
            );
        }
        Ok(Err(_)) => stats.failed_sessions += 1,
        Err(e) => {
            stats.failed_sessions += 1;
            tracing::error!(error = %e, "Session task panicked or was cancelled");
        }
    }
}
