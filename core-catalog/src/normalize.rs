//! Name normalization for matching and URL-safe paths.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Decompose and drop combining marks: `"Phim Hoạt Hình"` -> `"Phim Hoat Hinh"`.
pub fn strip_diacritics(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            // Stroked letters carry no combining mark under NFD.
            'đ' => 'd',
            'Đ' => 'D',
            'ø' => 'o',
            'Ø' => 'O',
            'ł' => 'l',
            'Ł' => 'L',
            other => other,
        })
        .collect()
}

/// Comparison key for folder names: diacritics stripped, lowercased, trimmed.
pub fn normalize_name(value: &str) -> String {
    strip_diacritics(value.trim()).to_lowercase()
}

/// One URL-safe path segment.
///
/// Non-alphanumeric runs collapse to a single `-`; leading and trailing
/// dashes are dropped. A name with nothing usable becomes `untitled`.
pub fn sanitize_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in strip_diacritics(value).chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    if out.is_empty() {
        "untitled".to_string()
    } else {
        out
    }
}

/// `<section>/<seg>/<seg>` from human-readable names.
pub fn build_slug_path<S: AsRef<str>>(section: &str, segments: &[S]) -> String {
    let mut path = sanitize_segment(section);
    for segment in segments {
        path.push('/');
        path.push_str(&sanitize_segment(segment.as_ref()));
    }
    path
}
