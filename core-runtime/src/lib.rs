//! # Core Runtime
//!
//! Startup plumbing shared by the binary and the sync crates.
//!
//! [`config`] turns flags and environment variables into validated
//! [`SyncSettings`](config::SyncSettings); a malformed section fails here,
//! before the remote host is contacted. [`logging`] installs the `tracing`
//! subscriber and carries the helpers that keep credentials and signed URLs
//! out of log lines.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
