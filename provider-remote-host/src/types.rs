//! Remote host response adapter
//!
//! The host is not consistent about field names: a slug may arrive as `slug`,
//! `id` or `key`, a folder flag as `is_folder`, `isFolder` or `type: "folder"`,
//! and list payloads may be a bare array or wrapped in `items`, `data`, or
//! split into `folders` and `files`. Everything below folds those variants
//! into the typed bridge values so nothing past this module sees raw JSON.

use bridge_traits::remote::{RemoteEntry, RemoteFileInfo};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{RemoteHostError, Result};

const SLUG_KEYS: &[&str] = &["slug", "id", "key", "hash"];
const NAME_KEYS: &[&str] = &["name", "title", "filename", "file_name", "fileName"];
const FOLDER_FLAG_KEYS: &[&str] = &["is_folder", "isFolder", "is_dir", "isDir", "folder"];
const KIND_KEYS: &[&str] = &["type", "kind", "item_type"];
const SIZE_KEYS: &[&str] = &["size", "bytes", "file_size", "fileSize", "size_bytes"];
const EXTENSION_KEYS: &[&str] = &["extension", "ext", "file_extension"];
const DURATION_KEYS: &[&str] = &["duration", "duration_seconds", "durationSeconds", "length"];
const MIME_KEYS: &[&str] = &["mime_type", "mimeType", "mime", "content_type"];
const THUMBNAIL_KEYS: &[&str] = &[
    "thumbnail",
    "thumbnail_url",
    "thumbnailUrl",
    "thumb",
    "preview_image",
];
const VIDEO_PREVIEW_KEYS: &[&str] = &[
    "video_preview",
    "video_preview_url",
    "videoPreviewUrl",
    "preview_video",
    "preview_url",
];
const PARENT_KEYS: &[&str] = &[
    "parent_folder_slug",
    "parentFolderSlug",
    "parent_slug",
    "parentSlug",
    "folder_slug",
    "parent",
    "folder",
];
const LIST_KEYS: &[&str] = &["items", "contents", "children", "entries", "results", "data"];
const WRAPPER_KEYS: &[&str] = &["data", "file", "result"];
const TOKEN_KEYS: &[&str] = &["token", "access_token", "accessToken", "session", "jwt"];
const CURSOR_KEYS: &[&str] = &["next_cursor", "nextCursor", "next_page_token", "nextPageToken"];

/// Login request body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// First present, non-null value among `keys`.
fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(as_text)
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Seconds from a number, a numeric string, or `hh:mm:ss` / `mm:ss`.
fn as_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(seconds) = s.parse::<f64>() {
                return Some(seconds);
            }

            let mut total = 0.0;
            for part in s.split(':') {
                total = total * 60.0 + part.trim().parse::<f64>().ok()?;
            }
            s.contains(':').then_some(total)
        }
        _ => None,
    }
}

fn is_folder(obj: &Map<String, Value>) -> bool {
    if let Some(flag) = FOLDER_FLAG_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(Value::as_bool)
    {
        return flag;
    }

    text(obj, KIND_KEYS)
        .map(|kind| {
            matches!(
                kind.to_ascii_lowercase().as_str(),
                "folder" | "dir" | "directory"
            )
        })
        .unwrap_or(false)
}

/// Make host-relative preview links absolute.
fn absolute_url(raw: &str, base_url: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            raw.trim_start_matches('/')
        )
    }
}

fn url(obj: &Map<String, Value>, keys: &[&str], base_url: &str) -> Option<String> {
    text(obj, keys).map(|raw| absolute_url(&raw, base_url))
}

fn extension_from_name(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 8 || ext.contains(char::is_whitespace) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn unwrap_object<'a>(payload: &'a Value, context: &str) -> Result<&'a Map<String, Value>> {
    let mut obj = payload.as_object().ok_or_else(|| {
        RemoteHostError::ParseError(format!("{} response is not a JSON object", context))
    })?;

    // `{ "data": { ...file... } }` and `{ "file": { ... } }`
    while let Some(inner) = WRAPPER_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(Value::as_object)
    {
        if first(obj, NAME_KEYS).is_some() {
            break;
        }
        obj = inner;
    }

    Ok(obj)
}

fn to_entry(value: &Value, forced_folder: Option<bool>) -> Option<RemoteEntry> {
    let obj = value.as_object()?;

    let Some(slug) = text(obj, SLUG_KEYS) else {
        warn!(entry = %value, "Dropping listing entry without a slug");
        return None;
    };

    let name = text(obj, NAME_KEYS).unwrap_or_else(|| slug.clone());

    Some(RemoteEntry {
        slug,
        name,
        is_folder: forced_folder.unwrap_or_else(|| is_folder(obj)),
        size: first(obj, SIZE_KEYS).and_then(as_u64),
    })
}

/// Folder listing page: entries plus an optional continuation cursor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub entries: Vec<RemoteEntry>,
    pub next_cursor: Option<String>,
}

/// Normalize any supported listing shape.
pub fn normalize_listing(payload: &Value) -> Result<ListingPage> {
    match payload {
        Value::Array(items) => Ok(ListingPage {
            entries: items.iter().filter_map(|v| to_entry(v, None)).collect(),
            next_cursor: None,
        }),
        Value::Object(obj) => {
            let next_cursor = text(obj, CURSOR_KEYS);

            let folders = obj.get("folders").and_then(Value::as_array);
            let files = obj.get("files").and_then(Value::as_array);
            if folders.is_some() || files.is_some() {
                let entries = folders
                    .into_iter()
                    .flatten()
                    .filter_map(|v| to_entry(v, Some(true)))
                    .chain(
                        files
                            .into_iter()
                            .flatten()
                            .filter_map(|v| to_entry(v, Some(false))),
                    )
                    .collect();
                return Ok(ListingPage {
                    entries,
                    next_cursor,
                });
            }

            for key in LIST_KEYS {
                match obj.get(*key) {
                    Some(inner @ Value::Array(_)) => {
                        let mut page = normalize_listing(inner)?;
                        page.next_cursor = next_cursor;
                        return Ok(page);
                    }
                    Some(inner @ Value::Object(_)) => {
                        let mut page = normalize_listing(inner)?;
                        page.next_cursor = page.next_cursor.or(next_cursor);
                        return Ok(page);
                    }
                    _ => {}
                }
            }

            Err(RemoteHostError::ParseError(
                "Folder listing has no recognizable item array".to_string(),
            ))
        }
        _ => Err(RemoteHostError::ParseError(
            "Folder listing is neither an array nor an object".to_string(),
        )),
    }
}

/// Entries of a single listing payload, ignoring any cursor.
pub fn normalize_entries(payload: &Value) -> Result<Vec<RemoteEntry>> {
    normalize_listing(payload).map(|page| page.entries)
}

/// Normalize a file detail payload.
pub fn normalize_file_info(payload: &Value, base_url: &str) -> Result<RemoteFileInfo> {
    let obj = unwrap_object(payload, "File detail")?;

    let name = text(obj, NAME_KEYS)
        .ok_or_else(|| RemoteHostError::ParseError("File detail has no name".to_string()))?;

    let extension = text(obj, EXTENSION_KEYS)
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .or_else(|| extension_from_name(&name));

    let parent_folder_slug = match first(obj, PARENT_KEYS) {
        Some(Value::Object(parent)) => text(parent, SLUG_KEYS),
        Some(other) => as_text(other),
        None => None,
    };

    Ok(RemoteFileInfo {
        extension,
        size: first(obj, SIZE_KEYS).and_then(as_u64),
        duration_seconds: first(obj, DURATION_KEYS).and_then(as_seconds),
        mime_type: text(obj, MIME_KEYS),
        thumbnail_url: url(obj, THUMBNAIL_KEYS, base_url),
        video_preview_url: url(obj, VIDEO_PREVIEW_KEYS, base_url),
        parent_folder_slug,
        name,
    })
}

/// Session token from a login response.
pub fn extract_token(payload: &Value) -> Option<String> {
    let obj = payload.as_object()?;
    text(obj, TOKEN_KEYS).or_else(|| {
        WRAPPER_KEYS
            .iter()
            .filter_map(|key| obj.get(*key))
            .find_map(extract_token)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://host.example";

    #[test]
    fn test_listing_bare_array() {
        let page = normalize_listing(&json!([
            {"slug": "f1", "name": "Anime", "is_folder": true},
            {"id": 42, "title": "ep1.mp4", "type": "file", "size": "2048"}
        ]))
        .unwrap();

        assert_eq!(
            page.entries,
            vec![
                RemoteEntry {
                    slug: "f1".into(),
                    name: "Anime".into(),
                    is_folder: true,
                    size: None
                },
                RemoteEntry {
                    slug: "42".into(),
                    name: "ep1.mp4".into(),
                    is_folder: false,
                    size: Some(2048)
                },
            ]
        );
    }

    #[test]
    fn test_listing_split_folders_and_files() {
        let page = normalize_listing(&json!({
            "folders": [{"key": "f1", "filename": "Season 1"}],
            "files": [{"slug": "v1", "name": "ep1.mp4", "bytes": 10}],
            "nextCursor": "c2"
        }))
        .unwrap();

        assert_eq!(page.entries.len(), 2);
        assert!(page.entries[0].is_folder);
        assert!(!page.entries[1].is_folder);
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
    }

    #[test]
    fn test_listing_wrapped_in_data() {
        let page = normalize_listing(&json!({
            "data": {"items": [{"slug": "f1", "name": "A", "kind": "Directory"}]},
            "next_page_token": "t"
        }))
        .unwrap();

        assert!(page.entries[0].is_folder);
        assert_eq!(page.next_cursor.as_deref(), Some("t"));
    }

    #[test]
    fn test_listing_drops_entries_without_slug() {
        let page = normalize_listing(&json!({"items": [{"name": "orphan"}, {"slug": "ok"}]})).unwrap();

        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].name, "ok");
    }

    #[test]
    fn test_entries_from_children() {
        let entries =
            normalize_entries(&json!({"children": [{"hash": "h1", "file_name": "a.srt"}]})).unwrap();

        assert_eq!(entries[0].slug, "h1");
        assert_eq!(entries[0].name, "a.srt");
    }

    #[test]
    fn test_listing_rejects_unknown_shape() {
        assert!(normalize_listing(&json!({"message": "hi"})).is_err());
        assert!(normalize_listing(&json!("nope")).is_err());
    }

    #[test]
    fn test_file_info_variants() {
        let info = normalize_file_info(
            &json!({
                "data": {
                    "title": "Show.S01E02.MKV",
                    "file_size": 123456,
                    "length": "01:02:03",
                    "thumbnailUrl": "/thumbs/abc.jpg?sig=1",
                    "preview_video": "//cdn.example/p.mp4",
                    "folder": {"slug": "parent1", "name": "Season 1"}
                }
            }),
            BASE,
        )
        .unwrap();

        assert_eq!(info.name, "Show.S01E02.MKV");
        assert_eq!(info.extension.as_deref(), Some("mkv"));
        assert_eq!(info.size, Some(123456));
        assert_eq!(info.duration_seconds, Some(3723.0));
        assert_eq!(
            info.thumbnail_url.as_deref(),
            Some("https://host.example/thumbs/abc.jpg?sig=1")
        );
        assert_eq!(
            info.video_preview_url.as_deref(),
            Some("https://cdn.example/p.mp4")
        );
        assert_eq!(info.parent_folder_slug.as_deref(), Some("parent1"));
    }

    #[test]
    fn test_file_info_explicit_extension_wins() {
        let info = normalize_file_info(
            &json!({"name": "clip", "ext": ".MP4", "duration": 12.5, "parent": "p"}),
            BASE,
        )
        .unwrap();

        assert_eq!(info.extension.as_deref(), Some("mp4"));
        assert_eq!(info.duration_seconds, Some(12.5));
        assert_eq!(info.parent_folder_slug.as_deref(), Some("p"));
        assert_eq!(info.thumbnail_url, None);
    }

    #[test]
    fn test_file_info_requires_name() {
        assert!(normalize_file_info(&json!({"size": 1}), BASE).is_err());
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token(&json!({"token": "t1"})).as_deref(), Some("t1"));
        assert_eq!(
            extract_token(&json!({"data": {"accessToken": "t2"}})).as_deref(),
            Some("t2")
        );
        assert_eq!(extract_token(&json!({"ok": true})), None);
    }
}
