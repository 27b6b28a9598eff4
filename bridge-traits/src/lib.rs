//! # Bridge Traits
//!
//! The capabilities the sync pipeline consumes but does not implement:
//!
//! - [`HttpClient`](http::HttpClient) for raw HTTP, used by the connector and
//!   by media downloads
//! - [`RemoteHost`](remote::RemoteHost) for session-based folder listings and
//!   file details
//! - [`ObjectStorage`](object_storage::ObjectStorage) as the permanent home of
//!   mirrored previews
//!
//! Every trait is `Send + Sync` and is shared as `Arc<dyn Trait>` between
//! the walk and the mirror workers.
//!
//! Implementations report failures as [`BridgeError`]. Keep `Unauthorized`
//! and `NotFound` distinct from `OperationFailed`: callers abort, skip or
//! retry based on the variant.

pub mod error;
pub mod http;
pub mod object_storage;
pub mod remote;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use object_storage::ObjectStorage;
pub use remote::{RemoteEntry, RemoteFileInfo, RemoteHost, Session};
