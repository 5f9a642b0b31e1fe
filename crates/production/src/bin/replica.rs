//! Palisade replica node.
//!
//! # Usage
//!
//! ```bash
//! palisade-replica --config replica-0.toml
//! ```
//!
//! See `ReplicaConfig` for the recognized configuration keys. The process
//! logs every upcall; committed payloads are reported with their digest.

use anyhow::{Context, Result};
use clap::Parser;
use palisade_core::Notification;
use palisade_production::{ProductionRunner, ReplicaConfig};
use palisade_types::Hash;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Palisade replica node.
///
/// Runs one replica of the PBFT replication engine.
#[derive(Parser, Debug)]
#[command(name = "palisade-replica")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long)]
    config: PathBuf,

    /// Log level filter (overrides RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ReplicaConfig::load(&cli.config).context("loading configuration")?;
    let (runner, mut notifications) = ProductionRunner::new(&config)
        .await
        .context("bootstrapping replica")?;

    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            match notification {
                Notification::Initial { replica } => {
                    info!(%replica, "replica ready");
                }
                Notification::ViewInstalled {
                    members,
                    view_number,
                } => {
                    info!(view_number, members = members.len(), "view installed");
                }
                Notification::Committed { payload, .. } => {
                    info!(
                        bytes = payload.len(),
                        digest = %Hash::digest(&payload),
                        "payload committed"
                    );
                }
                Notification::LeaderSuspected { view_number } => {
                    info!(view_number, "leader suspected");
                }
            }
        }
    });

    tokio::select! {
        _ = runner.run() => {}
        _ = signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }
    Ok(())
}
