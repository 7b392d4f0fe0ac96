//! Wire types shared by the debugger bridge crates.
//!
//! Everything a front-end can observe on the HTTP or WebSocket surface is
//! defined here, so the field names and close semantics have a single source.
//!
//! # Main Types
//!
//! - [`VersionInfo`] - body of the discovery version query
//! - [`DiscoveryRecord`] - one attachable target in the discovery list
//! - [`TargetDescriptor`] - registry form of a target, as loaded from disk
//! - [`CloseReason`] - close code and reason carried by a close frame

pub mod close;
pub mod discovery;

pub use close::CloseReason;
pub use discovery::{DiscoveryRecord, TargetDescriptor, VersionInfo};
