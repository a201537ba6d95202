//! AVStream Bridge Server
//!
//! WebSocket endpoint that announces a session id to every client and forwards
//! the media chunks it sends to the configured stream sink.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use avstream_bridge::config::ServerConfig;
use avstream_bridge::server::WebSocketServer;
use avstream_bridge::sink::LoggingSink;

/// AVStream Bridge Server
///
/// WebSocket bridge for session-multiplexed media streaming
#[derive(Parser, Debug)]
#[command(name = "avstream-bridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on [default: 4040]
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address [default: 127.0.0.1]
    #[arg(long)]
    bind: Option<String>,

    /// WebSocket endpoint path [default: /session]
    #[arg(long)]
    path: Option<String>,

    /// Maximum inbound message size in bytes, 0 for no limit
    #[arg(long)]
    max_message_size: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Build the server configuration, letting flags override the config file
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(path) = &self.path {
            config = config.with_path(path.clone());
        }
        if self.max_message_size.is_some() {
            config = config.with_max_message_size(self.max_message_size);
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging, RUST_LOG takes precedence over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("AVStream Bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = args.server_config()?;

    // Create and start the WebSocket server
    let server = Arc::new(WebSocketServer::new(config, Arc::new(LoggingSink)));
    let server_handle = Arc::clone(&server);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown...");
        server_handle.shutdown();
    });

    // Run the server
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
