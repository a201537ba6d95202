//! WebSocket server implementation
//!
//! Provides a WebSocket server that listens on a configurable port and serves
//! every accepted connection on its own task.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

use super::dispatch::Dispatcher;
use super::handler::ConnectionHandler;
use crate::config::ServerConfig;
use crate::session::SessionRegistry;
use crate::sink::StreamSink;

/// WebSocket server for streaming clients
pub struct WebSocketServer {
    config: Arc<ServerConfig>,
    dispatcher: Arc<Dispatcher>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WebSocketServer {
    /// Create a new WebSocket server delivering chunks to `sink`
    pub fn new(config: ServerConfig, sink: Arc<dyn StreamSink>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(SessionRegistry::new());
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(Dispatcher::new(registry, sink)),
            shutdown_tx,
        }
    }

    /// Get the session registry shared by all connections
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.dispatcher.registry()
    }

    /// Trigger server shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!(
            "WebSocket server listening on ws://{}{}",
            listener.local_addr()?,
            self.config.path
        );
        Ok(listener)
    }

    /// Run the WebSocket server
    ///
    /// This will listen for incoming connections and handle them concurrently.
    /// The server will shut down gracefully when a shutdown signal is received.
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                // Accept new connections
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            info!("New connection from {}", peer_addr);
                            let handler = ConnectionHandler::new(
                                peer_addr,
                                Arc::clone(&self.config),
                                Arc::clone(&self.dispatcher),
                                self.shutdown_tx.subscribe(),
                            );

                            tokio::spawn(async move {
                                if let Err(e) = handler.run(stream).await {
                                    error!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                // Handle shutdown signal
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let registry = self.registry();
        info!(
            "Issued {} sessions, {} still open",
            registry.issued_count(),
            registry.session_count().await
        );
        registry.close_all().await;

        Ok(())
    }
}
