//! # Catalog Module
//!
//! Owns the relational catalog of mirrored remote content.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and embedded migrations for `catalog_entries`
//! - The [`CatalogEntry`] model and its media references
//! - [`CatalogRepository`] for data access
//! - [`CatalogUpserter`], the idempotent slug-keyed upsert protocol that keeps
//!   the parent/child tree and denormalized paths consistent
//! - Name normalization shared with folder resolution

pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod repository;
pub mod upsert;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{CatalogError, Result};
pub use models::{CatalogEntry, ContentType, MediaKind, MediaRef};
pub use repository::{CatalogRepository, SqliteCatalogRepository};
pub use upsert::{CatalogUpserter, FileUpsert, FolderUpsert, Placement, UpsertOutcome};
