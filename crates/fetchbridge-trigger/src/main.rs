//! fetchbridge-dev: run a fetchbridge handler behind a local HTTP listener.
//!
//! Registers the echo handler with an in-process fetch host and serves it
//! until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! fetchbridge-dev --bind 127.0.0.1:8787 --config fetchbridge.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fetchbridge::{listen_and_serve, BridgeConfig};
use fetchbridge_trigger::{echo_handler, HttpTrigger, LocalHost};
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "fetchbridge-dev", about = "Serve a fetchbridge handler over local HTTP")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: SocketAddr,

    /// Bridge configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fetchbridge=debug,fetchbridge_trigger=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    info!(
        entry_point = %config.entry_point,
        registration = ?config.registration_policy,
        handler_faults = ?config.handler_faults,
        "bridge configuration"
    );

    let host = Arc::new(LocalHost::new());
    let trigger = HttpTrigger::bind(cli.bind, Arc::clone(&host)).await?;
    info!(addr = %trigger.local_addr()?, "fetchbridge-dev ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(trigger.serve(shutdown_rx));

    tokio::select! {
        served = listen_and_serve(&*host, echo_handler(), config) => {
            served.context("fetch bridge stopped")?;
            // Only reached when a repeated registration was ignored.
            tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
        }
    }

    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    server.await??;
    Ok(())
}
