//! Command-line entry point for the relay daemon.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default address (127.0.0.1:8765)
//! relayd
//!
//! # Bind elsewhere
//! relayd --host 0.0.0.0 --port 9000
//! PORT=9000 relayd
//!
//! # Use a config file
//! relayd --config /etc/chat-relay/relayd.toml
//!
//! # Enable debug logging
//! RUST_LOG=relayd=debug relayd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting and exit

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::RelayConfig;
use crate::registry::spawn_registry;
use crate::server::RelayServer;

/// Chat relay daemon
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
pub struct Args {
    /// Host or IP address to bind (overrides RELAY_HOST and the config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides PORT and the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to a TOML config file (overrides RELAY_CONFIG)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Log filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_LOG_FILTER: &str = "relayd=info,relay_core=info,relay_protocol=info";

impl Args {
    /// Resolves the full configuration stack against the process environment.
    pub fn resolve_config(&self) -> Result<RelayConfig> {
        self.resolve_config_with(|key| env::var(key).ok())
    }

    /// Resolves the configuration stack with an explicit environment lookup.
    pub fn resolve_config_with<F>(&self, env: F) -> Result<RelayConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RelayConfig::load(self.config.as_deref(), env)
            .context("Failed to load configuration")?;
        config.apply_overrides(self.host.clone(), self.port);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Parses arguments and runs the daemon until a shutdown signal.
pub fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;
    run_daemon(config)
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: RelayConfig) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "Chat relay starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the connection registry
    let registry = spawn_registry();
    info!("Connection registry started");

    let addr = config.bind_addr();
    let server = RelayServer::bind(
        &addr,
        registry,
        config.connection_settings(),
        cancel_token,
    )
    .await
    .with_context(|| format!("Failed to start server on {addr}"))?;

    info!(addr = %addr, "Starting server");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Chat relay stopped");
    Ok(())
}

/// Builds the log filter from `RUST_LOG`, falling back to info for our crates.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
