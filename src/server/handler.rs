//! WebSocket connection handler
//!
//! Owns one client connection from the upgrade handshake to teardown. The
//! connection gets exactly one session; the session id is announced before any
//! inbound frame is read, and the session is closed whenever the read loop ends.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{accept_hdr_async_with_config, WebSocketStream};
use tracing::{debug, info, warn};

use super::dispatch::{DispatchError, Dispatcher};
use super::protocol::{ProtocolError, ServerMessage};
use crate::config::ServerConfig;
use crate::session::Session;

type WsSender = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsReceiver = SplitStream<WebSocketStream<TcpStream>>;

/// Errors that end a connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    #[error("Transport error: {0}")]
    Transport(#[source] tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result type for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Handles a single WebSocket connection
pub struct ConnectionHandler {
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    dispatcher: Arc<Dispatcher>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(
        peer_addr: SocketAddr,
        config: Arc<ServerConfig>,
        dispatcher: Arc<Dispatcher>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            peer_addr,
            config,
            dispatcher,
            shutdown_rx,
        }
    }

    /// Serve the connection until the client goes away or the server shuts down
    pub async fn run(mut self, stream: TcpStream) -> ConnectionResult<()> {
        let ws_stream = self.upgrade(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let registry = Arc::clone(self.dispatcher.registry());
        let session = registry.create(self.peer_addr).await;

        if let Err(e) = announce(&mut ws_sender, &session).await {
            registry.close(session.id()).await;
            return Err(e);
        }
        info!("Session {} opened for {}", session.id(), self.peer_addr);

        let result = self
            .read_loop(&mut ws_sender, &mut ws_receiver, &session)
            .await;

        // Sole teardown path for the session
        registry.close(session.id()).await;
        let stats = session.stats();
        info!(
            "Session {} closed after {:.1?} ({} chunks, {} bytes)",
            session.id(),
            session.age(),
            stats.chunks,
            stats.bytes
        );

        result
    }

    /// Perform the WebSocket handshake, rejecting requests on other paths
    async fn upgrade(&self, stream: TcpStream) -> ConnectionResult<WebSocketStream<TcpStream>> {
        let expected_path = self.config.path.clone();
        let peer_addr = self.peer_addr;

        let check_path = move |request: &Request, response: Response| {
            if request.uri().path() == expected_path {
                Ok(response)
            } else {
                warn!(
                    "Rejecting upgrade from {} on unknown path {}",
                    peer_addr,
                    request.uri().path()
                );
                let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            }
        };

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = self.config.max_message_size;

        accept_hdr_async_with_config(stream, check_path, Some(ws_config))
            .await
            .map_err(ConnectionError::Handshake)
    }

    async fn read_loop(
        &mut self,
        ws_sender: &mut WsSender,
        ws_receiver: &mut WsReceiver,
        session: &Session,
    ) -> ConnectionResult<()> {
        let peer_addr = self.peer_addr;

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            handle_text(&self.dispatcher, peer_addr, text.as_bytes()).await;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            warn!(
                                "Received binary message from {} ({} bytes), ignoring",
                                peer_addr,
                                data.len()
                            );
                        }
                        Some(Ok(Message::Ping(data))) => {
                            ws_sender
                                .send(Message::Pong(data))
                                .await
                                .map_err(ConnectionError::Transport)?;
                        }
                        Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) => {
                            info!("Client {} requested close for session {}", peer_addr, session.id());
                            break;
                        }
                        Some(Ok(Message::Frame(_))) => {
                            // Raw frame, ignore
                        }
                        Some(Err(e)) => {
                            return Err(ConnectionError::Transport(e));
                        }
                        None => {
                            debug!("Connection closed by {}", peer_addr);
                            break;
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, closing session {}", session.id());
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Dispatch one text frame. Failures only drop the frame.
async fn handle_text(dispatcher: &Dispatcher, peer_addr: SocketAddr, raw: &[u8]) {
    match dispatcher.dispatch(raw).await {
        Ok(outcome) => {
            debug!("Message from {} handled: {:?}", peer_addr, outcome);
        }
        Err(DispatchError::UnknownSession(id)) => {
            debug!("Dropping message from {} for unknown session {}", peer_addr, id);
        }
        Err(e) => {
            warn!("Dropping message from {}: {}", peer_addr, e);
        }
    }
}

/// Send the ReceiveSessionId announcement as the first frame
async fn announce(ws_sender: &mut WsSender, session: &Session) -> ConnectionResult<()> {
    let announcement = ServerMessage::session_id(session.id()).encode()?;
    ws_sender
        .send(Message::Text(announcement))
        .await
        .map_err(ConnectionError::Transport)?;
    debug!("Sent session id {} to {}", session.id(), session.peer_addr());
    Ok(())
}
