//! Catalog domain models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CatalogError;

/// Metadata key holding the transient thumbnail URL while it awaits mirroring.
pub const THUMBNAIL_TEMP_URL_KEY: &str = "thumbnail_temp_url";
/// Metadata key holding the transient video preview URL.
pub const VIDEO_PREVIEW_TEMP_URL_KEY: &str = "video_preview_temp_url";

/// Classifier output stored on each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Folder,
    Video,
    Audio,
    Image,
    Comic,
    Ebook,
    Pdf,
    Document,
    Archive,
    Other,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Folder => "folder",
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Image => "image",
            ContentType::Comic => "comic",
            ContentType::Ebook => "ebook",
            ContentType::Pdf => "pdf",
            ContentType::Document => "document",
            ContentType::Archive => "archive",
            ContentType::Other => "other",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folder" => Ok(ContentType::Folder),
            "video" => Ok(ContentType::Video),
            "audio" => Ok(ContentType::Audio),
            "image" => Ok(ContentType::Image),
            "comic" => Ok(ContentType::Comic),
            "ebook" => Ok(ContentType::Ebook),
            "pdf" => Ok(ContentType::Pdf),
            "document" => Ok(ContentType::Document),
            "archive" => Ok(ContentType::Archive),
            "other" => Ok(ContentType::Other),
            _ => Err(CatalogError::invalid(
                "content_type",
                format!("Unknown content type: {}", s),
            )),
        }
    }
}

/// Which preview asset a media reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Thumbnail,
    VideoPreview,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Thumbnail, MediaKind::VideoPreview];

    /// Column holding the reference.
    pub fn column(&self) -> &'static str {
        match self {
            MediaKind::Thumbnail => "thumbnail_ref",
            MediaKind::VideoPreview => "video_preview_ref",
        }
    }

    /// Metadata key mirroring a pending transient URL.
    pub fn temp_url_key(&self) -> &'static str {
        match self {
            MediaKind::Thumbnail => THUMBNAIL_TEMP_URL_KEY,
            MediaKind::VideoPreview => VIDEO_PREVIEW_TEMP_URL_KEY,
        }
    }

    /// Top-level object storage prefix.
    pub fn storage_prefix(&self) -> &'static str {
        match self {
            MediaKind::Thumbnail => "thumbnails",
            MediaKind::VideoPreview => "video-previews",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Thumbnail => "thumbnail",
            MediaKind::VideoPreview => "video_preview",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media reference is either a permanent storage key or a transient URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    Permanent(String),
    Transient(String),
}

impl MediaRef {
    pub fn parse(value: &str) -> Self {
        if is_transient_url(value) {
            MediaRef::Transient(value.to_string())
        } else {
            MediaRef::Permanent(value.to_string())
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, MediaRef::Permanent(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            MediaRef::Permanent(v) | MediaRef::Transient(v) => v,
        }
    }
}

/// `http://` and `https://` values are remote links that still need mirroring.
pub fn is_transient_url(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// One mirrored remote folder or file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Local identifier referenced by `parent_id`
    pub id: String,
    /// Remote host identifier, unique across the whole catalog
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub is_folder: bool,
    pub section: String,
    pub content_type: ContentType,
    pub extension: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub mime_type: Option<String>,
    pub metadata: Map<String, Value>,
    pub parent_id: Option<String>,
    /// Remote-side parent slug, used to notice moves
    pub parent_folder_slug: Option<String>,
    /// Human-readable breadcrumb: `/Media/Anime/Episode 1.mp4`
    pub file_path: String,
    /// Sanitized path: `videos/media/anime/episode-1-mp4`
    pub slug_path: String,
    pub thumbnail_ref: Option<String>,
    pub video_preview_ref: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CatalogEntry {
    /// Create a new entry with a fresh local id and current timestamps.
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        section: impl Into<String>,
        is_folder: bool,
        content_type: ContentType,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            slug: slug.into(),
            title: title.into(),
            description: None,
            is_folder,
            section: section.into(),
            content_type,
            extension: None,
            file_size_bytes: None,
            duration_seconds: None,
            mime_type: None,
            metadata: Map::new(),
            parent_id: None,
            parent_folder_slug: None,
            file_path: String::new(),
            slug_path: String::new(),
            thumbnail_ref: None,
            video_preview_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn media_ref(&self, kind: MediaKind) -> Option<MediaRef> {
        let value = match kind {
            MediaKind::Thumbnail => self.thumbnail_ref.as_deref(),
            MediaKind::VideoPreview => self.video_preview_ref.as_deref(),
        };
        value.map(MediaRef::parse)
    }

    pub fn set_media_ref(&mut self, kind: MediaKind, value: Option<String>) {
        match kind {
            MediaKind::Thumbnail => self.thumbnail_ref = value,
            MediaKind::VideoPreview => self.video_preview_ref = value,
        }
    }

    /// Transient URLs still waiting to be mirrored.
    pub fn pending_media(&self) -> Vec<(MediaKind, String)> {
        MediaKind::ALL
            .iter()
            .filter_map(|kind| match self.media_ref(*kind) {
                Some(MediaRef::Transient(url)) => Some((*kind, url)),
                _ => None,
            })
            .collect()
    }

    /// Validate entry data
    pub fn validate(&self) -> Result<(), String> {
        if self.slug.trim().is_empty() {
            return Err("Slug cannot be empty".to_string());
        }

        if self.title.trim().is_empty() {
            return Err("Title cannot be empty".to_string());
        }

        if self.section.trim().is_empty() {
            return Err("Section cannot be empty".to_string());
        }

        if self.is_folder != (self.content_type == ContentType::Folder) {
            return Err(format!(
                "Content type {} does not match is_folder={}",
                self.content_type, self.is_folder
            ));
        }

        if self.file_path.is_empty() || self.slug_path.is_empty() {
            return Err("Entry paths cannot be empty".to_string());
        }

        Ok(())
    }
}
