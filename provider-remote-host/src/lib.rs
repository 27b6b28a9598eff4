//! # Remote Host Provider
//!
//! Implements [`RemoteHost`](bridge_traits::RemoteHost) for the JSON file host
//! whose folder tree is mirrored into the catalog.
//!
//! ## Overview
//!
//! - Username/password login returning an explicit [`Session`](bridge_traits::Session)
//! - Folder listing (account root or by slug) with cursor pagination
//! - File detail with fresh, time-limited preview URLs
//! - An adapter ([`types`]) that folds the host's inconsistent response
//!   shapes into one typed `RemoteEntry` / `RemoteFileInfo`
//!
//! Status mapping: `401`/`403` become `Unauthorized`, `404` becomes
//! `NotFound`, everything else is a transient `OperationFailed`.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::RemoteHostConnector;
pub use error::{RemoteHostError, Result};
