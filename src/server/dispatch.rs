//! Command dispatcher
//!
//! Routes decoded client envelopes to the stream sink of the addressed session.
//! Every failure here is local to one message: the caller logs it and keeps
//! reading, the connection is never torn down because of a bad frame.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::protocol::{ClientMessage, Command, ProtocolError};
use crate::session::SessionRegistry;
use crate::sink::StreamSink;

/// Errors that cause a single inbound message to be dropped
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Failed to decode chunk payload for session {session_id}: {source}")]
    PayloadDecode {
        session_id: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// What happened to a successfully parsed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A chunk of `bytes` bytes was handed to the sink
    Delivered { bytes: usize },
    /// The command is not handled by the bridge and was dropped
    Ignored(Command),
}

/// Routes inbound messages to the stream sink
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn StreamSink>,
}

impl Dispatcher {
    /// Create a dispatcher over a shared registry and sink
    pub fn new(registry: Arc<SessionRegistry>, sink: Arc<dyn StreamSink>) -> Self {
        Self { registry, sink }
    }

    /// Get the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handle one raw inbound text frame
    ///
    /// The sink is invoked exactly once for each chunk that decodes, and never otherwise.
    pub async fn dispatch(&self, raw: &[u8]) -> DispatchResult<DispatchOutcome> {
        let message = ClientMessage::decode(raw)?;

        let session = self
            .registry
            .get(&message.session_id)
            .await
            .ok_or_else(|| DispatchError::UnknownSession(message.session_id.clone()))?;

        match message.command {
            Command::ReceiveChunk => {
                let data = message
                    .chunk_payload()
                    .map_err(|source| DispatchError::PayloadDecode {
                        session_id: message.session_id.clone(),
                        source,
                    })?;

                // The connection may have closed between lookup and here
                let state = session
                    .accept_chunk(data.len())
                    .await
                    .ok_or_else(|| DispatchError::UnknownSession(message.session_id.clone()))?;

                debug!(
                    "Receiving chunk for session {} ({} bytes, state {:?})",
                    session.id(),
                    data.len(),
                    state
                );

                let bytes = data.len();
                self.sink.consume(&session, data).await;
                Ok(DispatchOutcome::Delivered { bytes })
            }
            command @ (Command::ReceiveSessionId | Command::Unknown) => {
                debug!(
                    "Ignoring {:?} command for session {}",
                    command,
                    session.id()
                );
                Ok(DispatchOutcome::Ignored(command))
            }
        }
    }
}
