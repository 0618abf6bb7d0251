//! Stockroom command-line entry point.
//!
//! Thin wrapper around the stockroom-cli library that initializes logging,
//! parses arguments and runs one command against stdout.

use anyhow::Result;
use clap::Parser;
use stockroom_cli::Cli;

fn main() -> Result<()> {
    // Logs go to stderr so command output on stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("Data directory: {}", cli.data_dir.display());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    stockroom_cli::run(&cli, &mut out)
}
