//! # Desktop Bridge
//!
//! Concrete bridge implementations for a process running on a normal host:
//! [`ReqwestHttpClient`] for HTTP and [`FsObjectStorage`], which keeps
//! mirrored previews in a local directory tree. The remote file host
//! connector is a separate crate, `provider-remote-host`.
//!
//! ```ignore
//! let http = Arc::new(ReqwestHttpClient::new()?);
//! let storage = Arc::new(FsObjectStorage::new("/srv/content-mirror/objects"));
//! ```

mod http;
mod object_storage;

pub use http::ReqwestHttpClient;
pub use object_storage::FsObjectStorage;
