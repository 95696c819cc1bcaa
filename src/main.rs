//! hammer-gateway - framed JSON IPC gateway over a Unix socket.
//!
//! Prints one ready line to stdout once the socket is bound; all logs go to
//! stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hammer_gateway::config::{DEFAULT_SNAPSHOT_PATH, DEFAULT_SOCKET_PATH};
use hammer_gateway::control::announce_ready;
use hammer_gateway::Gateway;

#[derive(Parser, Debug)]
#[command(name = "hammer-gateway")]
#[command(about = "Local IPC gateway speaking framed JSON over a Unix socket")]
struct Args {
    /// Unix socket to listen on
    #[arg(short, long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Store snapshot file
    #[arg(long, default_value = DEFAULT_SNAPSHOT_PATH)]
    snapshot: PathBuf,

    /// Seconds an async request may stay pending
    #[arg(long, default_value = "30")]
    async_timeout_secs: u64,

    /// Persist the snapshot after every recorded request
    #[arg(long)]
    persist_on_record: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --debug when set.
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    info!("Starting hammer-gateway {}", env!("CARGO_PKG_VERSION"));

    let gateway = Gateway::builder()
        .socket_path(&args.socket)
        .snapshot_path(&args.snapshot)
        .async_timeout(Duration::from_secs(args.async_timeout_secs))
        .persist_on_record(args.persist_on_record)
        .build()
        .with_context(|| format!("failed to load snapshot {}", args.snapshot.display()))?;

    let listener = gateway
        .bind()
        .await
        .with_context(|| format!("failed to bind {}", args.socket.display()))?;
    announce_ready(listener.path())?;

    gateway
        .serve_listener(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let store = gateway.store().clone();
    tokio::task::spawn_blocking(move || store.persist())
        .await
        .context("snapshot task failed")?
        .with_context(|| format!("failed to persist {}", args.snapshot.display()))?;
    info!("Snapshot written to {}", args.snapshot.display());

    Ok(())
}
