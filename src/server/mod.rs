//! WebSocket server module
//!
//! Accepts streaming clients, runs one connection handler per client and
//! routes their messages to the stream sink.

mod dispatch;
mod handler;
mod protocol;
mod websocket;

pub use dispatch::*;
pub use handler::*;
pub use protocol::*;
pub use websocket::*;
