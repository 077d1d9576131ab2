//! Concurrent client fan-out.
//!
//! Each client gets its own connection, its own frequency table and its own
//! artifact file. Nothing is merged across clients.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::client::{SessionDriver, SessionReport};
use crate::error::{Result, WordfeedError};
use crate::stats::CompletionStats;

/// Outcome of one fan-out run.
#[derive(Debug, Clone)]
pub struct HarnessReport {
    /// One report per client, sorted by client id.
    pub sessions: Vec<SessionReport>,
    /// Wall-clock time until the last client finished.
    pub elapsed: Duration,
}

impl HarnessReport {
    pub fn truncated(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_truncated()).count()
    }

    pub fn total_words(&self) -> u64 {
        self.sessions.iter().map(|s| s.tokens_received).sum()
    }
}

/// Runs `clients` concurrent sessions against one server.
#[derive(Debug, Clone)]
pub struct LoadHarness {
    addr: SocketAddr,
    page_size: usize,
    clients: usize,
    output_dir: PathBuf,
}

impl LoadHarness {
    /// Zero `page_size` or `clients` is a configuration error.
    pub fn new(
        addr: SocketAddr,
        page_size: usize,
        clients: usize,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        if page_size == 0 {
            return Err(WordfeedError::Config("k (page size) must be positive".into()));
        }
        if clients == 0 {
            return Err(WordfeedError::Config("client count must be positive".into()));
        }
        Ok(Self {
            addr,
            page_size,
            clients,
            output_dir: output_dir.into(),
        })
    }

    pub fn clients(&self) -> usize {
        self.clients
    }

    /// Run every client once and wait for all of them.
    ///
    /// Client ids start at 1.
    pub async fn run(&self) -> Result<HarnessReport> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            WordfeedError::Config(format!(
                "cannot create output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for client_id in 1..=self.clients as u32 {
            let driver = SessionDriver::new(client_id, self.page_size)?;
            let addr = self.addr;
            let output_dir = self.output_dir.clone();
            tasks.spawn(async move { driver.run(addr, &output_dir).await });
        }

        let mut sessions = Vec::with_capacity(self.clients);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => sessions.push(report),
                Err(e) => tracing::error!(error = %e, "Client task panicked"),
            }
        }
        sessions.sort_by_key(|s| s.client_id);

        let report = HarnessReport {
            sessions,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            clients = self.clients,
            truncated = report.truncated(),
            words = report.total_words(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "All clients finished"
        );
        Ok(report)
    }

    /// Repeat [`run`](Self::run) `repetitions` times and summarize the
    /// wall-clock completion times.
    pub async fn measure(&self, repetitions: usize) -> Result<CompletionStats> {
        let mut samples = Vec::with_capacity(repetitions);

        for round in 1..=repetitions {
            let report = self.run().await?;
            let secs = report.elapsed.as_secs_f64();
            tracing::debug!(round, secs, "Measurement round finished");
            samples.push(secs);
        }

        let stats = CompletionStats::from_samples(&samples);
        tracing::info!(
            repetitions,
            mean = stats.mean,
            ci_lower = stats.ci_lower,
            ci_upper = stats.ci_upper,
            "Completion time"
        );
        Ok(stats)
    }
}
