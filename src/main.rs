mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wordfeed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            cli::serve(&cli.config).await?;
        }
        Commands::Client { clients, output_dir } => {
            cli::client(&cli.config, clients, output_dir).await?;
        }
        Commands::Bench { repetitions, clients } => {
            cli::bench(&cli.config, repetitions, clients).await?;
        }
    }

    Ok(())
}
