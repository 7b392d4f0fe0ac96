//! Debugger bridge server.
//!
//! Serves the inspector discovery queries and two attach endpoints:
//!
//! - `/devtools/page/{id}` attaches to a known (or fallback-mapped) backend.
//! - `/launch-and-connect` starts a debuggee, waits for its announcement, and
//!   attaches to the address it printed.
//!
//! The relay itself lives in `bridge-runtime`; this crate wires it to axum.

pub mod access;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod handshake;
pub mod logging;
pub mod registry;
pub mod server;
pub mod sessions;
pub mod styles;

pub use config::BridgeConfig;
pub use error::BridgeError;
pub use server::BridgeServer;
