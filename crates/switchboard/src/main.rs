//! # switchboard
//!
//! Relay server binary: loads settings, initializes logging and metrics, and
//! serves chat relay and signaling until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use switchboard_server::{ServerConfig, SwitchboardServer};
use switchboard_settings::SwitchboardSettings;

/// Switchboard relay server.
#[derive(Parser, Debug)]
#[command(name = "switchboard", about = "Real-time chat relay and WebRTC signaling server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.switchboard/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(switchboard_settings::settings_path)
    }

    /// Flags win over every other layer.
    fn apply(&self, settings: &mut SwitchboardSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }

    fn resolve_settings(&self) -> Result<SwitchboardSettings> {
        let path = self.settings_path();
        let mut settings = switchboard_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;

    let _ = switchboard_logging::init_subscriber(&settings.logging);

    let metrics = switchboard_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let server =
        SwitchboardServer::new(ServerConfig::from(&settings.server)).with_metrics(metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Switchboard listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
