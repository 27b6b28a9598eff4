//! # Catalog Repository
//!
//! Persistence for [`CatalogEntry`] rows.

use crate::error::{CatalogError, Result};
use crate::models::{CatalogEntry, ContentType, MediaKind};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{FromRow, SqlitePool};

/// Catalog repository interface
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<CatalogEntry>>;

    /// Insert a new entry
    ///
    /// # Errors
    /// Fails if the slug already exists or the parent does not.
    async fn insert(&self, entry: &CatalogEntry) -> Result<()>;

    /// Update an existing entry, matched by `id`
    async fn update(&self, entry: &CatalogEntry) -> Result<()>;

    /// Replace one media reference with a permanent key and drop the matching
    /// temp URL from metadata.
    ///
    /// # Returns
    /// `Ok(false)` if no entry has this slug.
    async fn set_media_ref(&self, slug: &str, kind: MediaKind, permanent_key: &str) -> Result<bool>;

    /// Entries in `section` still holding a transient media reference.
    async fn find_with_transient_media(&self, section: &str) -> Result<Vec<CatalogEntry>>;

    async fn list_children(&self, parent_id: &str) -> Result<Vec<CatalogEntry>>;

    async fn count_by_section(&self, section: &str) -> Result<i64>;
}

/// SQLite implementation of [`CatalogRepository`]
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn validate(entry: &CatalogEntry) -> Result<()> {
        entry
            .validate()
            .map_err(|msg| CatalogError::invalid("CatalogEntry", msg))
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, slug, title, description, is_folder, section, content_type,
           extension, file_size_bytes, duration_seconds, mime_type, metadata,
           parent_id, parent_folder_slug, file_path, slug_path,
           thumbnail_ref, video_preview_ref, created_at, updated_at
    FROM catalog_entries
"#;

/// Database row representation of a catalog entry
#[derive(Debug, FromRow)]
struct CatalogEntryRow {
    id: String,
    slug: String,
    title: String,
    description: Option<String>,
    is_folder: bool,
    section: String,
    content_type: String,
    extension: Option<String>,
    file_size_bytes: Option<i64>,
    duration_seconds: Option<f64>,
    mime_type: Option<String>,
    metadata: String,
    parent_id: Option<String>,
    parent_folder_slug: Option<String>,
    file_path: String,
    slug_path: String,
    thumbnail_ref: Option<String>,
    video_preview_ref: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<CatalogEntryRow> for CatalogEntry {
    type Error = CatalogError;

    fn try_from(row: CatalogEntryRow) -> Result<Self> {
        let content_type: ContentType = row.content_type.parse()?;
        let metadata = match serde_json::from_str::<Value>(&row.metadata)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(CatalogError::invalid(
                    "metadata",
                    format!("Expected JSON object for {}, got {}", row.slug, other),
                ))
            }
        };

        Ok(CatalogEntry {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            is_folder: row.is_folder,
            section: row.section,
            content_type,
            extension: row.extension,
            file_size_bytes: row.file_size_bytes,
            duration_seconds: row.duration_seconds,
            mime_type: row.mime_type,
            metadata,
            parent_id: row.parent_id,
            parent_folder_slug: row.parent_folder_slug,
            file_path: row.file_path,
            slug_path: row.slug_path,
            thumbnail_ref: row.thumbnail_ref,
            video_preview_ref: row.video_preview_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_entries(rows: Vec<CatalogEntryRow>) -> Result<Vec<CatalogEntry>> {
    rows.into_iter().map(CatalogEntry::try_from).collect()
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<CatalogEntry>> {
        let row = sqlx::query_as::<_, CatalogEntryRow>(&format!("{} WHERE slug = ?", SELECT_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CatalogEntry::try_from).transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CatalogEntry>> {
        let row = sqlx::query_as::<_, CatalogEntryRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CatalogEntry::try_from).transpose()
    }

    async fn insert(&self, entry: &CatalogEntry) -> Result<()> {
        Self::validate(entry)?;
        let metadata = serde_json::to_string(&entry.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO catalog_entries (
                id, slug, title, description, is_folder, section, content_type,
                extension, file_size_bytes, duration_seconds, mime_type, metadata,
                parent_id, parent_folder_slug, file_path, slug_path,
                thumbnail_ref, video_preview_ref, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.slug)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.is_folder)
        .bind(entry.section.as_str())
        .bind(entry.content_type.as_str())
        .bind(&entry.extension)
        .bind(entry.file_size_bytes)
        .bind(entry.duration_seconds)
        .bind(&entry.mime_type)
        .bind(metadata)
        .bind(&entry.parent_id)
        .bind(&entry.parent_folder_slug)
        .bind(&entry.file_path)
        .bind(&entry.slug_path)
        .bind(&entry.thumbnail_ref)
        .bind(&entry.video_preview_ref)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, entry: &CatalogEntry) -> Result<()> {
        Self::validate(entry)?;
        let metadata = serde_json::to_string(&entry.metadata)?;

        let result = sqlx::query(
            r#"
            UPDATE catalog_entries SET
                slug = ?, title = ?, description = ?, is_folder = ?, section = ?,
                content_type = ?, extension = ?, file_size_bytes = ?,
                duration_seconds = ?, mime_type = ?, metadata = ?, parent_id = ?,
                parent_folder_slug = ?, file_path = ?, slug_path = ?,
                thumbnail_ref = ?, video_preview_ref = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.slug)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.is_folder)
        .bind(entry.section.as_str())
        .bind(entry.content_type.as_str())
        .bind(&entry.extension)
        .bind(entry.file_size_bytes)
        .bind(entry.duration_seconds)
        .bind(&entry.mime_type)
        .bind(metadata)
        .bind(&entry.parent_id)
        .bind(&entry.parent_folder_slug)
        .bind(&entry.file_path)
        .bind(&entry.slug_path)
        .bind(&entry.thumbnail_ref)
        .bind(&entry.video_preview_ref)
        .bind(entry.updated_at)
        .bind(&entry.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::EntryNotFound {
                id: entry.id.clone(),
            });
        }

        Ok(())
    }

    async fn set_media_ref(&self, slug: &str, kind: MediaKind, permanent_key: &str) -> Result<bool> {
        // Column and key names come from a closed enum, never from input.
        let sql = format!(
            "UPDATE catalog_entries SET {} = ?, metadata = json_remove(metadata, '$.{}'), updated_at = ? WHERE slug = ?",
            kind.column(),
            kind.temp_url_key()
        );

        let result = sqlx::query(&sql)
            .bind(permanent_key)
            .bind(chrono::Utc::now().timestamp())
            .bind(slug)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_with_transient_media(&self, section: &str) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query_as::<_, CatalogEntryRow>(&format!(
            "{} WHERE section = ? \
             AND (lower(substr(thumbnail_ref, 1, 7)) = 'http://' \
               OR lower(substr(thumbnail_ref, 1, 8)) = 'https://' \
               OR lower(substr(video_preview_ref, 1, 7)) = 'http://' \
               OR lower(substr(video_preview_ref, 1, 8)) = 'https://') \
             ORDER BY slug_path",
            SELECT_COLUMNS
        ))
        .bind(section)
        .fetch_all(&self.pool)
        .await?;

        into_entries(rows)
    }

    async fn list_children(&self, parent_id: &str) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query_as::<_, CatalogEntryRow>(&format!(
            "{} WHERE parent_id = ? ORDER BY is_folder DESC, title",
            SELECT_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        into_entries(rows)
    }

    async fn count_by_section(&self, section: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM catalog_entries WHERE section = ?")
                .bind(section)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn folder(slug: &str, section: &str) -> CatalogEntry {
        let mut entry = CatalogEntry::new(slug, "Anime", section, true, ContentType::Folder);
        entry.file_path = "/Anime".to_string();
        entry.slug_path = format!("{}/anime", section);
        entry
    }

    fn file_under(parent: &CatalogEntry, slug: &str) -> CatalogEntry {
        let mut entry = CatalogEntry::new(slug, "Ep 1.mp4", &parent.section, false, ContentType::Video);
        entry.parent_id = Some(parent.id.clone());
        entry.file_path = format!("{}/Ep 1.mp4", parent.file_path);
        entry.slug_path = format!("{}/ep-1-mp4", parent.slug_path);
        entry
    }

    async fn repo() -> SqliteCatalogRepository {
        SqliteCatalogRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_find_by_slug() {
        let repo = repo().await;
        let mut entry = folder("f1", "videos");
        entry
            .metadata
            .insert("note".to_string(), Value::String("x".to_string()));
        repo.insert(&entry).await.unwrap();

        let found = repo.find_by_slug("f1").await.unwrap().unwrap();
        assert_eq!(found, entry);
        assert!(repo.find_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slug_is_unique() {
        let repo = repo().await;
        repo.insert(&folder("f1", "videos")).await.unwrap();

        let duplicate = folder("f1", "comics");
        assert!(matches!(
            repo.insert(&duplicate).await,
            Err(CatalogError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_parent_must_exist() {
        let repo = repo().await;
        let parent = folder("f1", "videos");
        let orphan = file_under(&parent, "file1");

        assert!(repo.insert(&orphan).await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_entry_is_not_found() {
        let repo = repo().await;
        let entry = folder("f1", "videos");

        assert!(matches!(
            repo.update(&entry).await,
            Err(CatalogError::EntryNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_media_ref_drops_temp_url() {
        let repo = repo().await;
        let parent = folder("f1", "videos");
        repo.insert(&parent).await.unwrap();

        let mut file = file_under(&parent, "file1");
        file.thumbnail_ref = Some("https://cdn.host/t.jpg".to_string());
        file.metadata.insert(
            MediaKind::Thumbnail.temp_url_key().to_string(),
            Value::String("https://cdn.host/t.jpg".to_string()),
        );
        repo.insert(&file).await.unwrap();

        let patched = repo
            .set_media_ref("file1", MediaKind::Thumbnail, "thumbnails/2024/01/01/abc.jpg")
            .await
            .unwrap();
        assert!(patched);

        let stored = repo.find_by_slug("file1").await.unwrap().unwrap();
        assert_eq!(
            stored.thumbnail_ref.as_deref(),
            Some("thumbnails/2024/01/01/abc.jpg")
        );
        assert!(!stored
            .metadata
            .contains_key(MediaKind::Thumbnail.temp_url_key()));

        assert!(!repo
            .set_media_ref("nope", MediaKind::Thumbnail, "k")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_find_with_transient_media_filters_by_section() {
        let repo = repo().await;
        let videos = folder("f1", "videos");
        let comics = folder("f2", "comics");
        repo.insert(&videos).await.unwrap();
        repo.insert(&comics).await.unwrap();

        let mut pending = file_under(&videos, "pending");
        pending.video_preview_ref = Some("https://cdn.host/p.mp4".to_string());
        repo.insert(&pending).await.unwrap();

        let mut mirrored = file_under(&videos, "mirrored");
        mirrored.slug_path = format!("{}/mirrored", videos.slug_path);
        mirrored.thumbnail_ref = Some("thumbnails/2024/01/01/a.jpg".to_string());
        repo.insert(&mirrored).await.unwrap();

        let mut other_section = file_under(&comics, "other");
        other_section.thumbnail_ref = Some("http://cdn.host/t.jpg".to_string());
        repo.insert(&other_section).await.unwrap();

        let found = repo.find_with_transient_media("videos").await.unwrap();
        let slugs: Vec<_> = found.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["pending"]);

        assert_eq!(repo.count_by_section("videos").await.unwrap(), 3);
        assert_eq!(repo.list_children(&videos.id).await.unwrap().len(), 2);
    }
}
