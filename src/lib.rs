//! AVStream Bridge
//!
//! Multiplexes real-time media streams from many WebSocket clients. Each
//! connection is given a session; base64 chunks sent on that session are
//! decoded and handed, in order, to a [`sink::StreamSink`].

pub mod config;
pub mod server;
pub mod session;
pub mod sink;

#[cfg(test)]
mod test_helpers;
