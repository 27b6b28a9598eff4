//! Content classification by file extension and section.

use core_catalog::ContentType;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "3gp",
];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "aac", "ogg", "m4a", "wma", "opus"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "heic", "tiff"];
const COMIC_EXTENSIONS: &[&str] = &["cbz", "cbr", "cb7", "cbt"];
const EBOOK_EXTENSIONS: &[&str] = &["epub", "mobi", "azw", "azw3", "fb2"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "rtf", "odt", "xls", "xlsx", "ppt", "pptx", "md",
];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"];
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt", "ass", "ssa"];

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Classify a file. Section overrides apply before the extension table.
pub fn classify(extension: Option<&str>, section: &str) -> ContentType {
    let ext = extension.map(normalize_extension).unwrap_or_default();

    match section.to_ascii_lowercase().as_str() {
        "comics" | "manga" => return ContentType::Comic,
        "ebooks" | "books" if ext == "pdf" => return ContentType::Pdf,
        _ => {}
    }

    let ext = ext.as_str();
    if VIDEO_EXTENSIONS.contains(&ext) {
        ContentType::Video
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        ContentType::Audio
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        ContentType::Image
    } else if COMIC_EXTENSIONS.contains(&ext) {
        ContentType::Comic
    } else if EBOOK_EXTENSIONS.contains(&ext) {
        ContentType::Ebook
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        ContentType::Document
    } else if ARCHIVE_EXTENSIONS.contains(&ext) {
        ContentType::Archive
    } else {
        ContentType::Other
    }
}

pub fn is_subtitle_extension(extension: &str) -> bool {
    SUBTITLE_EXTENSIONS.contains(&normalize_extension(extension).as_str())
}

pub fn is_video_extension(extension: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&normalize_extension(extension).as_str())
}

/// Lowercased extension of `filename`, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}
