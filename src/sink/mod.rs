//! Stream sink interface
//!
//! The sink is the downstream consumer of decoded chunk bytes. Reassembly,
//! decoding and playback of the media stream all live behind this trait.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::session::{Session, SessionState};

/// Consumer of decoded media chunks
///
/// The dispatcher awaits `consume` inline, so a slow sink delays further
/// chunks of the same session but never those of other sessions. Calls for one
/// session arrive in the order the client sent them. An in-flight call is never
/// cancelled by the bridge.
#[async_trait]
pub trait StreamSink: Send + Sync {
    /// Consume one decoded chunk belonging to `session`
    async fn consume(&self, session: &Session, data: Vec<u8>);
}

/// Sink that only reports what it receives
///
/// Used by the bridge binary when no media pipeline is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait]
impl StreamSink for LoggingSink {
    async fn consume(&self, session: &Session, data: Vec<u8>) {
        let stats = session.stats();
        if stats.chunks == 1 && session.state().await == SessionState::Streaming {
            info!(
                "Session {} started streaming from {}",
                session.id(),
                session.peer_addr()
            );
        }
        debug!(
            "Session {} chunk #{}: {} bytes ({} total)",
            session.id(),
            stats.chunks,
            data.len(),
            stats.bytes
        );
    }
}
