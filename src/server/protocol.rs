//! Protocol message definitions
//!
//! Defines the JSON envelopes exchanged between streaming clients and the bridge.
//! Every message, in both directions, carries a command, a session id and a
//! string payload. Chunk payloads are standard base64 with padding.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Protocol-related errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    #[error("Failed to serialize message: {0}")]
    SerializationFailure(#[source] serde_json::Error),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

// ============================================================================
// Commands
// ============================================================================

/// Command carried by an envelope
///
/// Commands the bridge does not know decode to [`Command::Unknown`] so newer
/// clients can talk to an older bridge; the dispatcher decides what to do with them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Command {
    /// Server to client: announces the session id of the connection
    ReceiveSessionId,
    /// Client to server: one base64 slice of the session's media stream
    ReceiveChunk,
    /// Any command string this version does not recognise
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Client Messages
// ============================================================================

/// Envelope sent from a client to the bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    /// Session the message is addressed to
    pub session_id: String,
    /// What the bridge should do with `data`
    pub command: Command,
    /// Base64 text, meaning depends on `command`
    pub data: String,
}

impl ClientMessage {
    /// Parse a client envelope from raw frame bytes
    ///
    /// All three fields are required. An unrecognised `command` is not an error.
    pub fn decode(raw: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(raw).map_err(ProtocolError::MalformedMessage)
    }

    /// Create a ReceiveChunk message, base64-encoding `bytes`
    pub fn chunk(session_id: impl Into<String>, bytes: impl AsRef<[u8]>) -> Self {
        ClientMessage {
            session_id: session_id.into(),
            command: Command::ReceiveChunk,
            data: STANDARD.encode(bytes),
        }
    }

    /// Decode the base64 `data` field into raw bytes
    pub fn chunk_payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.as_bytes())
    }

    /// Serialize the envelope to JSON (used by clients and tests)
    pub fn to_json(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(ProtocolError::SerializationFailure)
    }
}

// ============================================================================
// Server Messages
// ============================================================================

/// Envelope sent from the bridge to a client
///
/// Field order is part of the wire format: `command`, `sessionId`, `data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub command: Command,
    pub session_id: String,
    pub data: String,
}

impl ServerMessage {
    /// Create the ReceiveSessionId announcement for a freshly created session
    pub fn session_id(id: impl Into<String>) -> Self {
        let id = id.into();
        ServerMessage {
            command: Command::ReceiveSessionId,
            session_id: id.clone(),
            data: id,
        }
    }

    /// Serialize the envelope to JSON
    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(ProtocolError::SerializationFailure)
    }

    /// Parse a server envelope from JSON (primarily for clients and tests)
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(ProtocolError::MalformedMessage)
    }
}
