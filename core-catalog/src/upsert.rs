//! # Catalog Upsert Layer
//!
//! Idempotent, slug-keyed creation and update of folders and files.
//!
//! ## Overview
//!
//! Every call rewrites the entry's location from the caller's current walk
//! position, so an entry follows its remote counterpart when it moves. Paths
//! are recomputed from the parent entry:
//!
//! - `file_path`: parent `file_path` + `/` + title
//! - `slug_path`: parent `slug_path` + `/` + sanitized title
//!
//! Root entries build both from the section name and their breadcrumbs.
//!
//! Media references are sticky once permanent: a later sync that sees a fresh
//! transient URL for an already-mirrored asset keeps the permanent key.

use crate::error::{CatalogError, Result};
use crate::models::{is_transient_url, CatalogEntry, ContentType, MediaKind, MediaRef};
use crate::normalize::{build_slug_path, sanitize_segment};
use crate::repository::CatalogRepository;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result of one upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// The remote detail fetch failed, nothing was written.
    Skipped,
}

/// Where the entry sits in the catalog tree.
#[derive(Debug, Clone, Copy)]
pub enum Placement<'a> {
    /// Section root; `ancestors` are the breadcrumbs above the entry itself.
    Root { ancestors: &'a [String] },
    /// Child of an already-upserted folder.
    Under(&'a CatalogEntry),
}

#[derive(Debug, Clone)]
pub struct FolderUpsert {
    pub slug: String,
    pub title: String,
    pub section: String,
    pub parent_folder_slug: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileUpsert {
    pub slug: String,
    pub title: String,
    pub section: String,
    pub content_type: ContentType,
    pub extension: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub mime_type: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_preview_url: Option<String>,
    pub parent_folder_slug: Option<String>,
    /// Computed metadata (episode number, subtitles). Replaces what was stored.
    pub metadata: Map<String, Value>,
}

impl FileUpsert {
    fn incoming_url(&self, kind: MediaKind) -> Option<&str> {
        match kind {
            MediaKind::Thumbnail => self.thumbnail_url.as_deref(),
            MediaKind::VideoPreview => self.video_preview_url.as_deref(),
        }
    }
}

struct Location {
    parent_id: Option<String>,
    file_path: String,
    slug_path: String,
}

/// Slug-keyed upsert protocol over a [`CatalogRepository`].
pub struct CatalogUpserter {
    repository: Arc<dyn CatalogRepository>,
}

impl CatalogUpserter {
    pub fn new(repository: Arc<dyn CatalogRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn CatalogRepository> {
        &self.repository
    }

    #[instrument(skip(self, params, placement), fields(slug = %params.slug, section = %params.section))]
    pub async fn upsert_folder(
        &self,
        params: FolderUpsert,
        placement: Placement<'_>,
    ) -> Result<(UpsertOutcome, CatalogEntry)> {
        let location = locate(&params.slug, &params.title, &params.section, placement)?;
        let existing = self.find_existing(&params.slug, &params.section, true).await?;

        let (outcome, entry) = match existing {
            Some(mut entry) => {
                entry.title = params.title;
                entry.parent_folder_slug = params.parent_folder_slug;
                apply_location(&mut entry, location);
                entry.updated_at = chrono::Utc::now().timestamp();
                self.repository.update(&entry).await?;
                (UpsertOutcome::Updated, entry)
            }
            None => {
                let mut entry = CatalogEntry::new(
                    params.slug,
                    params.title,
                    params.section,
                    true,
                    ContentType::Folder,
                );
                entry.parent_folder_slug = params.parent_folder_slug;
                apply_location(&mut entry, location);
                self.repository.insert(&entry).await?;
                (UpsertOutcome::Created, entry)
            }
        };

        debug!(outcome = ?outcome, slug_path = %entry.slug_path, "Upserted folder");
        Ok((outcome, entry))
    }

    #[instrument(skip(self, params, placement), fields(slug = %params.slug, section = %params.section))]
    pub async fn upsert_file(
        &self,
        params: FileUpsert,
        placement: Placement<'_>,
    ) -> Result<(UpsertOutcome, CatalogEntry)> {
        let location = locate(&params.slug, &params.title, &params.section, placement)?;
        let existing = self.find_existing(&params.slug, &params.section, false).await?;

        let (outcome, mut entry) = match existing {
            Some(entry) => (UpsertOutcome::Updated, entry),
            None => (
                UpsertOutcome::Created,
                CatalogEntry::new(
                    params.slug.clone(),
                    params.title.clone(),
                    params.section.clone(),
                    false,
                    params.content_type,
                ),
            ),
        };

        entry.title = params.title.clone();
        entry.content_type = params.content_type;
        entry.extension = params.extension.clone();
        entry.file_size_bytes = params.file_size_bytes;
        entry.duration_seconds = params.duration_seconds;
        entry.mime_type = params.mime_type.clone();
        entry.parent_folder_slug = params.parent_folder_slug.clone();
        apply_location(&mut entry, location);
        merge_media(&mut entry, &params);

        match outcome {
            UpsertOutcome::Created => self.repository.insert(&entry).await?,
            _ => {
                entry.updated_at = chrono::Utc::now().timestamp();
                self.repository.update(&entry).await?
            }
        }

        debug!(
            outcome = ?outcome,
            content_type = %entry.content_type,
            pending_media = entry.pending_media().len(),
            "Upserted file"
        );
        Ok((outcome, entry))
    }

    async fn find_existing(
        &self,
        slug: &str,
        section: &str,
        is_folder: bool,
    ) -> Result<Option<CatalogEntry>> {
        let Some(entry) = self.repository.find_by_slug(slug).await? else {
            return Ok(None);
        };

        if entry.section != section {
            return Err(CatalogError::invalid(
                "section",
                format!(
                    "Slug {} is already catalogued in section '{}'",
                    slug, entry.section
                ),
            ));
        }

        if entry.is_folder != is_folder {
            return Err(CatalogError::invalid(
                "is_folder",
                format!("Slug {} changed between folder and file", slug),
            ));
        }

        Ok(Some(entry))
    }
}

fn locate(slug: &str, title: &str, section: &str, placement: Placement<'_>) -> Result<Location> {
    match placement {
        Placement::Root { ancestors } => {
            let mut segments: Vec<&str> = ancestors.iter().map(String::as_str).collect();
            segments.push(title);

            Ok(Location {
                parent_id: None,
                file_path: format!("/{}", segments.join("/")),
                slug_path: build_slug_path(section, &segments),
            })
        }
        Placement::Under(parent) => {
            if !parent.is_folder {
                return Err(CatalogError::invalid(
                    "parent_id",
                    format!("Parent {} is a file and cannot have children", parent.slug),
                ));
            }

            if parent.section != section {
                return Err(CatalogError::invalid(
                    "section",
                    format!(
                        "Parent {} belongs to section '{}', not '{}'",
                        parent.slug, parent.section, section
                    ),
                ));
            }

            if parent.slug == slug {
                return Err(CatalogError::invalid(
                    "parent_id",
                    format!("Entry {} cannot be its own parent", slug),
                ));
            }

            Ok(Location {
                parent_id: Some(parent.id.clone()),
                file_path: format!("{}/{}", parent.file_path.trim_end_matches('/'), title),
                slug_path: format!("{}/{}", parent.slug_path, sanitize_segment(title)),
            })
        }
    }
}

fn apply_location(entry: &mut CatalogEntry, location: Location) {
    entry.parent_id = location.parent_id;
    entry.file_path = location.file_path;
    entry.slug_path = location.slug_path;
}

/// Apply incoming preview URLs without ever demoting a permanent reference.
fn merge_media(entry: &mut CatalogEntry, params: &FileUpsert) {
    let mut metadata = params.metadata.clone();

    for kind in MediaKind::ALL {
        let incoming = params.incoming_url(kind).filter(|url| is_transient_url(url));

        let pending = match (entry.media_ref(kind), incoming) {
            (Some(MediaRef::Permanent(_)), _) => None,
            (_, Some(url)) => Some(url.to_string()),
            (Some(MediaRef::Transient(url)), None) => Some(url),
            (None, None) => None,
        };

        if let Some(url) = pending {
            metadata.insert(kind.temp_url_key().to_string(), Value::String(url.clone()));
            entry.set_media_ref(kind, Some(url));
        }
    }

    entry.metadata = metadata;
}
