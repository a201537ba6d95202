//! Shared helpers for unit and end-to-end tests

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::session::Session;
use crate::sink::StreamSink;

/// One recorded sink invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumed {
    pub session_id: String,
    pub data: Vec<u8>,
}

/// Sink that forwards every call to a channel the test can await
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<Consumed>,
}

impl RecordingSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Consumed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StreamSink for RecordingSink {
    async fn consume(&self, session: &Session, data: Vec<u8>) {
        let _ = self.tx.send(Consumed {
            session_id: session.id().to_string(),
            data,
        });
    }
}
