//! HTTP server module.
//!
//! The server includes graceful shutdown on SIGTERM/SIGINT, draining open
//! connections before the process exits.

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
