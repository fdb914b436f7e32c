//! Notification receiver binary: accepts deliveries on `/listen` and
//! discards them.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use tracing_subscriber::EnvFilter;

/// Accept PDF service notifications and acknowledge them.
#[derive(Parser, Debug)]
#[command(name = "pdftask-webhook", version)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "PDFTASK_WEBHOOK_ADDR", default_value = "0.0.0.0:8090")]
    addr: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let listener = tokio::net::TcpListener::bind(&cli.addr)
        .await
        .with_context(|| format!("Failed to bind {}", cli.addr))?;

    pdftask::webhook::serve(listener, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .context("Notification receiver failed")?;

    Ok(())
}
