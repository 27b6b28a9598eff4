//! # Sync Orchestrator
//!
//! Mirrors configured remote folders ("sections") into the catalog.
//!
//! ## Workflow
//!
//! Per section, sequentially:
//!
//! 1. Resolve the configured folder reference to a slug
//! 2. Re-enqueue entries still holding transient media from an earlier,
//!    interrupted run (flagged to refresh their links)
//! 3. Upsert the section root, then walk the tree depth-first with an
//!    explicit stack. Folders are upserted before their children. Per folder,
//!    subtitles are paired, videos numbered, and each file's detail fetched
//!    (rate limited) and upserted
//! 4. Drain the media mirror queue
//! 5. Report counts
//!
//! Login happens once per run. An authentication failure aborts the whole
//! run; any other section failure aborts only that section.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let orchestrator = SyncOrchestrator::new(host, http_client, storage, repository, SyncConfig::default());
//! let report = orchestrator.run(&settings.sections).await?;
//! for section in &report.sections {
//!     println!("{}", section);
//! }
//! ```

use bridge_traits::http::HttpClient;
use bridge_traits::object_storage::ObjectStorage;
use bridge_traits::remote::{RemoteEntry, RemoteHost, Session};
use core_catalog::{
    CatalogEntry, CatalogRepository, CatalogUpserter, FileUpsert, FolderUpsert, Placement,
    UpsertOutcome,
};
use core_runtime::config::{SectionConfig, SyncTuning};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::{classify, extension_of, is_video_extension};
use crate::error::{Result, SyncError};
use crate::listing::FolderListingCache;
use crate::matcher::{assign_episode_numbers, pair_subtitles, SubtitlePairing};
use crate::mirror_queue::{FailedMirror, MediaMirrorQueue, MirrorJob, MirrorQueueConfig};
use crate::resolver::{FolderResolver, ResolvedFolder};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub mirror: MirrorQueueConfig,
    /// Deepest BFS level explored when resolving a folder by name
    pub max_resolve_depth: usize,
    /// Deepest folder level walked below a section root
    pub max_walk_depth: usize,
    /// Pause between consecutive file-detail fetches
    pub detail_fetch_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig::from(&SyncTuning::default())
    }
}

impl From<&SyncTuning> for SyncConfig {
    fn from(tuning: &SyncTuning) -> Self {
        Self {
            mirror: MirrorQueueConfig {
                concurrency: tuning.mirror_concurrency,
                max_attempts: tuning.mirror_max_attempts,
                initial_backoff: tuning.mirror_initial_backoff,
            },
            max_resolve_depth: tuning.max_resolve_depth,
            max_walk_depth: tuning.max_walk_depth,
            detail_fetch_delay: tuning.detail_fetch_delay,
        }
    }
}

/// Counts for one section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionReport {
    pub section: String,
    pub folders_created: usize,
    pub folders_updated: usize,
    pub folders_skipped: usize,
    pub files_created: usize,
    pub files_updated: usize,
    pub files_skipped: usize,
    pub mirrors_completed: usize,
    pub mirrors_failed: usize,
    pub failed_mirrors: Vec<FailedMirror>,
}

impl SectionReport {
    fn new(section: &str) -> Self {
        Self {
            section: section.to_string(),
            ..Self::default()
        }
    }

    fn record_folder(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.folders_created += 1,
            UpsertOutcome::Updated => self.folders_updated += 1,
            UpsertOutcome::Skipped => self.folders_skipped += 1,
        }
    }

    fn record_file(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.files_created += 1,
            UpsertOutcome::Updated => self.files_updated += 1,
            UpsertOutcome::Skipped => self.files_skipped += 1,
        }
    }
}

impl fmt::Display for SectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] folders: {} created, {} updated, {} skipped | files: {} created, {} updated, {} skipped | mirrors: {} completed, {} failed",
            self.section,
            self.folders_created,
            self.folders_updated,
            self.folders_skipped,
            self.files_created,
            self.files_updated,
            self.files_skipped,
            self.mirrors_completed,
            self.mirrors_failed
        )
    }
}

/// A section that could not be synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFailure {
    pub section: String,
    pub reference: String,
    pub error: String,
    /// The configured folder reference did not resolve to a folder.
    #[serde(default)]
    pub unresolved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub sections: Vec<SectionReport>,
    pub failures: Vec<SectionFailure>,
}

impl RunReport {
    pub fn section(&self, name: &str) -> Option<&SectionReport> {
        self.sections.iter().find(|s| s.section == name)
    }

    pub fn is_failed(&self, section: &str) -> bool {
        self.failures.iter().any(|f| f.section == section)
    }

    pub fn is_unresolved(&self, section: &str) -> bool {
        self.failures
            .iter()
            .any(|f| f.section == section && f.unresolved)
    }

    pub fn total_mirrors_failed(&self) -> usize {
        self.sections.iter().map(|s| s.mirrors_failed).sum()
    }
}

/// Top-level sync driver.
pub struct SyncOrchestrator {
    host: Arc<dyn RemoteHost>,
    http_client: Arc<dyn HttpClient>,
    storage: Arc<dyn ObjectStorage>,
    repository: Arc<dyn CatalogRepository>,
    upserter: CatalogUpserter,
    config: SyncConfig,
}

/// One folder waiting on the walk stack.
struct WalkFrame {
    folder: CatalogEntry,
    depth: usize,
}

/// Mutable state of one section run.
struct SectionRun<'a> {
    section: &'a SectionConfig,
    session: &'a Session,
    cache: FolderListingCache,
    queue: MediaMirrorQueue,
    report: SectionReport,
    detail_fetched: bool,
}

impl SyncOrchestrator {
    pub fn new(
        host: Arc<dyn RemoteHost>,
        http_client: Arc<dyn HttpClient>,
        storage: Arc<dyn ObjectStorage>,
        repository: Arc<dyn CatalogRepository>,
        config: SyncConfig,
    ) -> Self {
        Self {
            upserter: CatalogUpserter::new(Arc::clone(&repository)),
            host,
            http_client,
            storage,
            repository,
            config,
        }
    }

    /// Sync every section in order.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Auth` (or the login failure) when the run cannot
    /// authenticate or the session is rejected mid-run. Section-level failures
    /// are recorded in [`RunReport::failures`] instead.
    #[instrument(skip(self, sections), fields(sections = sections.len()))]
    pub async fn run(&self, sections: &[SectionConfig]) -> Result<RunReport> {
        let session = self.host.login().await.map_err(SyncError::from)?;
        let mut report = RunReport::default();

        for section in sections {
            match self.sync_section(&session, section).await {
                Ok(section_report) => {
                    info!(%section_report, "Section synced");
                    report.sections.push(section_report);
                }
                Err(SyncError::Auth(msg)) => {
                    error!(section = %section.section, "Session rejected, aborting run");
                    return Err(SyncError::Auth(msg));
                }
                Err(e) => {
                    error!(section = %section.section, error = %e, "Section sync failed");
                    report.failures.push(SectionFailure {
                        section: section.section.clone(),
                        reference: section.folder_reference.clone(),
                        error: e.to_string(),
                        unresolved: matches!(e, SyncError::Resolution { .. }),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Sync one section with an existing session.
    #[instrument(skip(self, session, section), fields(section = %section.section))]
    pub async fn sync_section(
        &self,
        session: &Session,
        section: &SectionConfig,
    ) -> Result<SectionReport> {
        let mut run = SectionRun {
            section,
            session,
            cache: FolderListingCache::new(),
            queue: MediaMirrorQueue::new(
                Arc::clone(&self.host),
                session.clone(),
                Arc::clone(&self.http_client),
                Arc::clone(&self.storage),
                Arc::clone(&self.repository),
                self.config.mirror.clone(),
            ),
            report: SectionReport::new(&section.section),
            detail_fetched: false,
        };

        let resolved = FolderResolver::new(
            self.host.as_ref(),
            session,
            self.config.max_resolve_depth,
        )
        .resolve(&section.folder_reference, &mut run.cache)
        .await?;

        self.recover_pending_media(&mut run).await?;

        let root = self.upsert_root(&mut run, &resolved).await?;
        self.walk(&mut run, root).await?;

        let mirrors = run.queue.drain().await;
        run.report.mirrors_completed = mirrors.completed;
        run.report.mirrors_failed = mirrors.failed.len();
        run.report.failed_mirrors = mirrors.failed;

        debug!(listings = run.cache.fetch_count(), "Section walk finished");
        Ok(run.report)
    }

    /// Re-enqueue media left transient by an earlier run.
    async fn recover_pending_media(&self, run: &mut SectionRun<'_>) -> Result<()> {
        let stale = self
            .repository
            .find_with_transient_media(&run.section.section)
            .await?;

        let recovered = stale
            .iter()
            .filter_map(MirrorJob::from_entry)
            .map(|job| run.queue.enqueue(job.with_refresh(true)))
            .filter(|new| *new)
            .count();

        if recovered > 0 {
            info!(recovered, "Re-enqueued pending media from an earlier run");
        }
        Ok(())
    }

    async fn upsert_root(
        &self,
        run: &mut SectionRun<'_>,
        resolved: &ResolvedFolder,
    ) -> Result<CatalogEntry> {
        let section = run.section;
        let (last, ancestors) = match resolved.segments.split_last() {
            Some((last, ancestors)) => (Some(last.as_str()), ancestors.to_vec()),
            None => (None, Vec::new()),
        };
        let title = section.root_title(last).to_string();

        let (outcome, root) = self
            .upserter
            .upsert_folder(
                FolderUpsert {
                    slug: resolved.slug.clone(),
                    title,
                    section: section.section.clone(),
                    parent_folder_slug: None,
                },
                Placement::Root {
                    ancestors: &ancestors,
                },
            )
            .await?;

        run.report.record_folder(outcome);
        Ok(root)
    }

    /// Depth-first walk below `root` with an explicit stack.
    async fn walk(&self, run: &mut SectionRun<'_>, root: CatalogEntry) -> Result<()> {
        let mut visited: HashSet<String> = HashSet::from([root.slug.clone()]);
        let mut stack = vec![WalkFrame {
            folder: root,
            depth: 0,
        }];

        while let Some(frame) = stack.pop() {
            let children = match run
                .cache
                .children(self.host.as_ref(), run.session, Some(frame.folder.slug.as_str()))
                .await
            {
                Ok(children) => children,
                Err(SyncError::Auth(msg)) => return Err(SyncError::Auth(msg)),
                Err(e) => {
                    warn!(folder = %frame.folder.slug, error = %e, "Could not list folder, skipping its contents");
                    continue;
                }
            };

            let (folders, files): (Vec<RemoteEntry>, Vec<RemoteEntry>) =
                children.into_iter().partition(|c| c.is_folder);

            self.process_files(run, &frame.folder, &files).await?;

            if frame.depth >= self.config.max_walk_depth {
                if !folders.is_empty() {
                    warn!(
                        folder = %frame.folder.slug,
                        depth = frame.depth,
                        skipped = folders.len(),
                        "Walk depth limit reached, not descending"
                    );
                }
                continue;
            }

            // Reversed so the first listed folder is walked first.
            for child in folders.into_iter().rev() {
                if !visited.insert(child.slug.clone()) {
                    warn!(slug = %child.slug, "Folder already visited, skipping cycle");
                    continue;
                }

                let params = FolderUpsert {
                    slug: child.slug.clone(),
                    title: child.name.clone(),
                    section: run.section.section.clone(),
                    parent_folder_slug: Some(frame.folder.slug.clone()),
                };

                match self
                    .upserter
                    .upsert_folder(params, Placement::Under(&frame.folder))
                    .await
                {
                    Ok((outcome, folder)) => {
                        run.report.record_folder(outcome);
                        stack.push(WalkFrame {
                            folder,
                            depth: frame.depth + 1,
                        });
                    }
                    Err(e) => {
                        warn!(slug = %child.slug, error = %e, "Folder upsert failed, skipping subtree");
                        run.report.record_folder(UpsertOutcome::Skipped);
                    }
                }
            }
        }

        Ok(())
    }

    async fn process_files(
        &self,
        run: &mut SectionRun<'_>,
        parent: &CatalogEntry,
        files: &[RemoteEntry],
    ) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let pairing = pair_subtitles(files);
        let videos: Vec<&RemoteEntry> = files
            .iter()
            .filter(|f| extension_of(&f.name).is_some_and(|ext| is_video_extension(&ext)))
            .collect();
        let episodes = assign_episode_numbers(&videos);

        for file in files {
            if pairing.is_paired_subtitle(&file.slug) {
                continue;
            }

            let outcome = self
                .sync_file(run, parent, file, &pairing, episodes.get(&file.slug).copied())
                .await?;
            run.report.record_file(outcome);
        }

        Ok(())
    }

    /// Fetch detail, upsert and enqueue media for one file.
    ///
    /// Per-file failures become `Skipped`; only auth failures propagate.
    async fn sync_file(
        &self,
        run: &mut SectionRun<'_>,
        parent: &CatalogEntry,
        file: &RemoteEntry,
        pairing: &SubtitlePairing,
        episode: Option<u32>,
    ) -> Result<UpsertOutcome> {
        if run.detail_fetched && !self.config.detail_fetch_delay.is_zero() {
            tokio::time::sleep(self.config.detail_fetch_delay).await;
        }
        run.detail_fetched = true;

        let info = match self
            .host
            .get_file_detail(run.session, &file.slug)
            .await
            .map_err(SyncError::from)
        {
            Ok(info) => info,
            Err(SyncError::Auth(msg)) => return Err(SyncError::Auth(msg)),
            Err(e) => {
                warn!(slug = %file.slug, error = %e, "File detail unavailable, skipping");
                return Ok(UpsertOutcome::Skipped);
            }
        };

        let extension = info
            .extension
            .clone()
            .or_else(|| extension_of(&file.name));
        let content_type = classify(extension.as_deref(), &run.section.section);

        let mut metadata = Map::new();
        if let Some(episode) = episode {
            metadata.insert("episode_number".to_string(), Value::from(episode));
        }
        if let Some(tracks) = pairing.pairs.get(&file.slug) {
            match serde_json::to_value(tracks) {
                Ok(subtitles) => {
                    metadata.insert("subtitles".to_string(), subtitles);
                    metadata.insert("has_subtitles".to_string(), Value::Bool(true));
                }
                Err(e) => warn!(slug = %file.slug, error = %e, "Subtitle tracks not recorded"),
            }
        }

        let title = if info.name.trim().is_empty() {
            file.name.clone()
        } else {
            info.name.clone()
        };

        let params = FileUpsert {
            slug: file.slug.clone(),
            title,
            section: run.section.section.clone(),
            content_type,
            extension,
            file_size_bytes: info.size.or(file.size).and_then(|s| i64::try_from(s).ok()),
            duration_seconds: info.duration_seconds,
            mime_type: info.mime_type,
            thumbnail_url: info.thumbnail_url,
            video_preview_url: info.video_preview_url,
            parent_folder_slug: Some(parent.slug.clone()),
            metadata,
        };

        match self.upserter.upsert_file(params, Placement::Under(parent)).await {
            Ok((outcome, entry)) => {
                if let Some(job) = MirrorJob::from_entry(&entry) {
                    run.queue.enqueue(job);
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(slug = %file.slug, error = %e, "File upsert failed, skipping");
                Ok(UpsertOutcome::Skipped)
            }
        }
    }
}
