//! # Sync Module
//!
//! Mirrors remote folder trees into the catalog and their preview media into
//! object storage.
//!
//! ## Components
//!
//! - **Folder Resolver** (`resolver`): Locates a section's remote root by slug, path or name
//! - **Listing Cache** (`listing`): Lists each remote folder at most once per section
//! - **Content Classifier** (`classifier`): Maps extensions (and section) to a content type
//! - **Matcher** (`matcher`): Episode numbers and subtitle pairing from filenames
//! - **Media Mirror Queue** (`mirror_queue`): Bounded, retrying copy of preview media
//! - **Sync Orchestrator** (`coordinator`): Runs sections end to end and reports

pub mod classifier;
pub mod coordinator;
pub mod error;
pub mod listing;
pub mod matcher;
pub mod mirror_queue;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use classifier::{classify, is_subtitle_extension, is_video_extension};
pub use coordinator::{RunReport, SectionFailure, SectionReport, SyncConfig, SyncOrchestrator};
pub use error::{Result, SyncError};
pub use listing::FolderListingCache;
pub use matcher::{
    base_name, extract_episode_number, pair_subtitles, subtitle_language, SubtitleLanguage,
    SubtitlePairing, SubtitleTrack,
};
pub use mirror_queue::{
    FailedMirror, MediaMirrorQueue, MirrorJob, MirrorJobStatus, MirrorQueueConfig, MirrorReport,
};
pub use resolver::{FolderResolver, ResolveStrategy, ResolvedFolder};
