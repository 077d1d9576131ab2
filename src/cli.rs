use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use wordfeed::config::DEFAULT_CONFIG_FILE;
use wordfeed::{Config, ConnectionManager, LoadHarness, SessionOutcome, WordStore};

#[derive(Parser)]
#[command(name = "wordfeed")]
#[command(about = "Paginated word-stream server and frequency-counting clients")]
#[command(after_help = r#"EXAMPLES:
    # Serve the document named in config.json
    wordfeed serve

    # Run 8 concurrent clients, one output<N>.txt each
    wordfeed client --clients 8 --output-dir out

    # Time 50 fan-out runs and report a 95% confidence interval
    wordfeed bench --repetitions 50
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the configured document until Ctrl-C
    Serve,

    /// Run the client fan-out once
    Client {
        /// Number of concurrent clients (overrides num_clients)
        #[arg(long)]
        clients: Option<usize>,

        /// Directory for output<N>.txt files (overrides output_dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Repeat the client fan-out and summarize completion times
    Bench {
        /// Number of fan-out runs
        #[arg(long, default_value = "50")]
        repetitions: usize,

        /// Number of concurrent clients (overrides num_clients)
        #[arg(long)]
        clients: Option<usize>,
    },
}

pub async fn serve(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let settings = config.page_settings()?;
    let store = WordStore::open(&config.input_file)?;

    let manager = ConnectionManager::bind(config.socket_addr(), store, settings).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received, stopping"),
            Err(e) => tracing::error!(error = %e, "Cannot listen for Ctrl-C"),
        }
        signal_token.cancel();
    });

    manager.run(shutdown).await?;
    Ok(())
}

pub async fn client(
    config_path: &Path,
    clients: Option<usize>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let harness = LoadHarness::new(
        config.socket_addr(),
        config.k,
        clients.unwrap_or(config.num_clients),
        output_dir.unwrap_or_else(|| config.output_dir.clone()),
    )?;

    let report = harness.run().await?;

    for session in &report.sessions {
        match &session.outcome {
            SessionOutcome::Completed(sentinel) => tracing::info!(
                client = session.client_id,
                words = session.tokens_received,
                distinct = session.table.len(),
                sentinel = sentinel.as_str(),
                "Client completed"
            ),
            SessionOutcome::Truncated(reason) => tracing::warn!(
                client = session.client_id,
                words = session.tokens_received,
                reason = %reason,
                "Client truncated"
            ),
        }
    }

    println!(
        "{} clients finished in {:.4}s ({} truncated)",
        report.sessions.len(),
        report.elapsed.as_secs_f64(),
        report.truncated()
    );
    Ok(())
}

pub async fn bench(config_path: &Path, repetitions: usize, clients: Option<usize>) -> anyhow::Result<()> {
    if repetitions == 0 {
        anyhow::bail!("--repetitions must be positive");
    }

    let config = Config::load(config_path)?;
    let harness = LoadHarness::new(
        config.socket_addr(),
        config.k,
        clients.unwrap_or(config.num_clients),
        config.output_dir.clone(),
    )?;

    let stats = harness
        .measure(repetitions)
        .await
        .with_context(|| format!("benchmark against {} failed", config.socket_addr()))?;

    println!("k={} p={} clients={}: {}", config.k, config.p, harness.clients(), stats);
    Ok(())
}
