//! # TimeSync Server
//!
//! Keeps the shared in-game clock and broadcasts it to downstream servers.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (state in plugins/TimeSync/time.toml)
//! timesync
//!
//! # Start with a config file
//! timesync --config timesync.toml
//!
//! # Add servers and the status API from the command line
//! timesync --server lobby=127.0.0.1:25570 --server survival=127.0.0.1:25571 --http-addr 127.0.0.1:8090
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use timesync::{FileConfig, ServerHandle, TimeSyncBuilder};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "timesync")]
#[command(about = "Shared in-game clock for proxied game servers")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding time.toml
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Status API bind address
    #[arg(long)]
    http_addr: Option<String>,

    /// Downstream server as name=host:port (repeatable)
    #[arg(short, long = "server")]
    servers: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => FileConfig::default(),
    };

    // CLI takes precedence over the file
    let mut builder = file_config.apply(TimeSyncBuilder::new())?;
    if let Some(dir) = &args.data_dir {
        builder = builder.with_data_dir(dir);
    }
    if let Some(addr) = &args.http_addr {
        builder = builder.with_http_addr(addr)?;
    }
    for server in &args.servers {
        builder = builder.with_server(ServerHandle::parse(server)?);
    }

    if builder.config().servers.is_empty() {
        warn!("No downstream servers configured; the clock will run without broadcasting");
    }

    let sync = builder.build().context("building TimeSync")?;
    let handle = sync.handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                handle.shutdown();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    sync.run().await?;
    Ok(())
}
