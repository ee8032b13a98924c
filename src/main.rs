// ABOUTME: Main entry point for solo-listener, a single-client TCP listener
//
// Binary: solo-listener
// Usage: solo-listener [--bind ADDR] [--port PORT] [--capacity N]
// - Holds at most N clients (default 1); a new client evicts the old ones
// - SIGHUP closes every client connection, the listener keeps running
// - Exits with a failure status only on a fatal socket error

#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal};
use tracing::info;

use solo_listener::cli::{Cli, LogFormat};
use solo_listener::{ResetLatch, Server, forward_hangup};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(args.log_format);

    let config = args.to_config().context("Invalid listener configuration")?;

    // SIGHUP must be handled before the port opens, or an early signal
    // would terminate the process instead of resetting clients.
    let latch = ResetLatch::new();
    let _hangup = forward_hangup(latch.handle()).context("Failed to install SIGHUP handler")?;

    let server = Server::bind(&config, latch).context("Failed to start listener")?;
    info!(
        pid = std::process::id(),
        addr = %server.local_addr(),
        "Send SIGHUP to close all client connections"
    );

    server.run().await.context("Listener terminated")?;

    Ok(())
}

fn setup_logging(format: LogFormat) {
    use tracing_subscriber::prelude::*;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "solo_listener=info".into());
    let ansi = io::stderr().is_terminal();

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_ansi(ansi),
            )
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(io::stderr)
                    .with_ansi(false),
            )
            .with(filter)
            .init(),
    }
}
