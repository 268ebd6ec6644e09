//! # flickmatch
//!
//! Flickmatch server binary: loads settings, initializes logging and
//! metrics, then serves pairing sessions over HTTP + `WebSocket`.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use flickmatch_core::{EventEmitter, SessionManager, SessionRegistry};
use flickmatch_logging::LogConfig;
use flickmatch_server::config::ServerConfig;
use flickmatch_server::rpc::context::RpcContext;
use flickmatch_server::rpc::handlers::register_all;
use flickmatch_server::rpc::registry::MethodRegistry;
use flickmatch_server::server::FlickmatchServer;
use flickmatch_settings::FlickmatchSettings;

/// Flickmatch pairing server.
#[derive(Parser, Debug)]
#[command(name = "flickmatch", about = "Two-person swipe-to-match session server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.flickmatch/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut FlickmatchSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn build_sessions(settings: &FlickmatchSettings) -> Arc<SessionManager> {
    let registry = Arc::new(SessionRegistry::with_id_length(settings.sessions.id_length));
    let emitter = Arc::new(EventEmitter::new(settings.sessions.event_capacity));
    Arc::new(SessionManager::new(registry, emitter))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(flickmatch_settings::settings_path);
    let mut settings = flickmatch_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);
    settings.validate().context("Invalid settings")?;

    let log_config = LogConfig::from_strings(&settings.logging.level, &settings.logging.format)
        .context("Invalid logging settings")?;
    flickmatch_logging::init_subscriber(&log_config).context("Failed to initialize logging")?;

    let metrics_handle = flickmatch_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let sessions = build_sessions(&settings);
    let ctx = Arc::new(RpcContext::new(sessions));

    let mut registry = MethodRegistry::new();
    register_all(&mut registry);
    let method_count = registry.methods().len();

    let config = ServerConfig::from_settings(&settings);
    let server = FlickmatchServer::new(config, registry, ctx, metrics_handle);
    let addr = server.listen().await.context("Failed to bind server")?;

    tracing::info!(
        settings = %settings_path.display(),
        "Flickmatch listening on http://{addr} ({method_count} RPC methods registered)"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
