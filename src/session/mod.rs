//! Stream session management module
//!
//! Tracks one session per connected client and the registry that routes
//! inbound commands to them by session id.

mod registry;
mod state;

pub use registry::*;
pub use state::*;
