//! # Episode and Subtitle Matching
//!
//! Filename heuristics applied per folder during the walk:
//!
//! - episode numbers from common naming patterns, with a sequential fallback
//! - subtitle files paired to the video sharing their base name
//! - subtitle language from the `.xxx.` segment before the extension

use bridge_traits::remote::RemoteEntry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::classifier::{extension_of, is_subtitle_extension, is_video_extension};

const MIN_EPISODE: u32 = 1;
const MAX_EPISODE: u32 = 999;

/// Tried in order; the first capture in range wins.
static EPISODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bepisode[\s._-]*(\d{1,4})",
        r"(?i)\bep[\s._-]*(\d{1,4})",
        r"(?i)(?:^|[^a-z])e(\d{1,4})",
        r"[_-](\d{1,4})[_-]",
        r"^(\d{1,4})(?:[._]|$)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("episode pattern is valid"))
    .collect()
});

/// ISO 639 codes seen in subtitle filenames.
const LANGUAGES: &[(&[&str], &str, &str)] = &[
    (&["eng", "en"], "eng", "English"),
    (&["vie", "vi"], "vie", "Vietnamese"),
    (&["jpn", "ja", "jp"], "jpn", "Japanese"),
    (&["kor", "ko"], "kor", "Korean"),
    (&["chi", "zho", "zh", "chs", "cht"], "chi", "Chinese"),
    (&["fre", "fra", "fr"], "fre", "French"),
    (&["ger", "deu", "de"], "ger", "German"),
    (&["spa", "es"], "spa", "Spanish"),
    (&["ita", "it"], "ita", "Italian"),
    (&["por", "pt"], "por", "Portuguese"),
    (&["rus", "ru"], "rus", "Russian"),
    (&["tha", "th"], "tha", "Thai"),
    (&["ind", "id"], "ind", "Indonesian"),
    (&["ara", "ar"], "ara", "Arabic"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleLanguage {
    pub code: String,
    pub label: String,
}

/// One subtitle attached to a video, stored in the video's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub language: String,
    pub label: String,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Default)]
pub struct SubtitlePairing {
    /// Video slug to its subtitles
    pub pairs: HashMap<String, Vec<SubtitleTrack>>,
    /// Subtitle files with no matching video
    pub unpaired: Vec<RemoteEntry>,
}

impl SubtitlePairing {
    /// Whether `slug` is a subtitle attached to some video.
    pub fn is_paired_subtitle(&self, slug: &str) -> bool {
        self.pairs
            .values()
            .flatten()
            .any(|track| track.slug == slug)
    }
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Episode number from a filename, if one of the known patterns matches.
pub fn extract_episode_number(filename: &str) -> Option<u32> {
    let stem = strip_extension(filename);

    EPISODE_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(stem)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
            .find(|n| (MIN_EPISODE..=MAX_EPISODE).contains(n))
    })
}

/// Episode number per video slug: extracted where possible, otherwise the
/// 1-based position among `videos` sorted by name, skipping taken numbers.
pub fn assign_episode_numbers(videos: &[&RemoteEntry]) -> HashMap<String, u32> {
    let mut sorted: Vec<&RemoteEntry> = videos.to_vec();
    sorted.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    let mut numbers = HashMap::new();
    let mut taken = BTreeSet::new();
    for video in &sorted {
        if let Some(n) = extract_episode_number(&video.name) {
            numbers.insert(video.slug.clone(), n);
            taken.insert(n);
        }
    }

    for (position, video) in sorted.iter().enumerate() {
        if numbers.contains_key(&video.slug) {
            continue;
        }
        let mut candidate = position as u32 + 1;
        while taken.contains(&candidate) {
            candidate += 1;
        }
        taken.insert(candidate);
        numbers.insert(video.slug.clone(), candidate);
    }

    numbers
}

/// Language segment right before a subtitle extension, with the stem in
/// front of it. Three letters always count; two only for a known alias.
fn split_language_code(subtitle_stem: &str) -> Option<(&str, &str)> {
    let (rest, code) = subtitle_stem.rsplit_once('.')?;
    if !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let known = || {
        let lower = code.to_ascii_lowercase();
        LANGUAGES
            .iter()
            .any(|(aliases, _, _)| aliases.contains(&lower.as_str()))
    };
    match code.len() {
        3 => Some((rest, code)),
        2 if known() => Some((rest, code)),
        _ => None,
    }
}

/// Name shared by a video and its subtitles.
///
/// `Show.S01E02.eng.srt`, `Show.S01E02.en.srt` and `Show.S01E02.mp4` all give
/// `Show.S01E02`.
pub fn base_name(filename: &str) -> &str {
    let mut name = filename;

    if let Some((stem, ext)) = name.rsplit_once('.') {
        if is_subtitle_extension(ext) {
            name = split_language_code(stem).map_or(stem, |(rest, _)| rest);
        }
    }

    if let Some((stem, ext)) = name.rsplit_once('.') {
        if is_video_extension(ext) {
            name = stem;
        }
    }

    name
}

/// Language of a subtitle file.
pub fn subtitle_language(filename: &str) -> SubtitleLanguage {
    let code = filename
        .rsplit_once('.')
        .filter(|(_, ext)| is_subtitle_extension(ext))
        .and_then(|(stem, _)| split_language_code(stem))
        .map(|(_, code)| code.to_ascii_lowercase());

    let Some(code) = code else {
        return SubtitleLanguage {
            code: "eng".to_string(),
            label: "English".to_string(),
        };
    };

    match LANGUAGES.iter().find(|(aliases, _, _)| aliases.contains(&code.as_str())) {
        Some((_, canonical, label)) => SubtitleLanguage {
            code: canonical.to_string(),
            label: label.to_string(),
        },
        None => SubtitleLanguage {
            label: code.to_ascii_uppercase(),
            code,
        },
    }
}

fn is_subtitle(entry: &RemoteEntry) -> bool {
    extension_of(&entry.name).is_some_and(|ext| is_subtitle_extension(&ext))
}

fn is_video(entry: &RemoteEntry) -> bool {
    extension_of(&entry.name).is_some_and(|ext| is_video_extension(&ext))
}

/// Pair subtitle files with the videos in the same folder.
pub fn pair_subtitles(files: &[RemoteEntry]) -> SubtitlePairing {
    let mut videos: HashMap<String, &str> = HashMap::new();
    for video in files.iter().filter(|f| !f.is_folder && is_video(f)) {
        videos
            .entry(base_name(&video.name).to_string())
            .or_insert(video.slug.as_str());
    }

    let mut pairing = SubtitlePairing::default();
    for subtitle in files.iter().filter(|f| !f.is_folder && is_subtitle(f)) {
        match videos.get(base_name(&subtitle.name)) {
            Some(video_slug) => {
                let language = subtitle_language(&subtitle.name);
                pairing
                    .pairs
                    .entry(video_slug.to_string())
                    .or_default()
                    .push(SubtitleTrack {
                        language: language.code,
                        label: language.label,
                        slug: subtitle.slug.clone(),
                        title: subtitle.name.clone(),
                    });
            }
            None => pairing.unpaired.push(subtitle.clone()),
        }
    }

    pairing
}
