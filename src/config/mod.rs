//! Configuration module
//!
//! Handles loading the bridge server configuration.

mod server;

pub use server::*;
