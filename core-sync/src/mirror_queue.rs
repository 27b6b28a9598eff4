//! # Media Mirror Queue
//!
//! Copies transient preview media (thumbnails, video previews) from the remote
//! host into permanent object storage, then points the catalog at the stored
//! key.
//!
//! ## Overview
//!
//! - **Keyed by slug**: enqueueing the thumbnail and later the preview of the
//!   same entry yields one job carrying both
//! - **Bounded concurrency**: `drain` runs jobs on a semaphore-bounded
//!   `JoinSet`
//! - **Retry logic**: transient download/upload failures retry with
//!   exponential backoff up to an attempt ceiling; exhausted jobs are reported
//!   as permanently failed, never dropped
//! - **Link refresh**: jobs flagged `refresh` fetch fresh URLs from the remote
//!   before downloading. Crash-recovery jobs start flagged, and an expired-link
//!   response (403/410) flags the job for its next attempt
//!
//! Stored keys look like `thumbnails/2024/05/17/<sha256>.jpg`.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bridge_traits::object_storage::ObjectStorage;
use bridge_traits::remote::{RemoteHost, Session};
use bytes::Bytes;
use core_catalog::{CatalogEntry, CatalogRepository, MediaKind};
use core_runtime::logging::strip_query;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, SyncError};

/// Timeout for a single media download
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Mirror job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorJobStatus {
    /// Queued, not yet attempted
    Pending,
    /// An attempt is in flight
    Uploading,
    /// Waiting for backoff before the next attempt
    Retrying,
    /// Every pending asset is stored and recorded
    Completed,
    /// Attempt ceiling reached, or the remote file is gone
    PermanentlyFailed,
}

impl MirrorJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::PermanentlyFailed => "permanently_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::PermanentlyFailed)
    }
}

/// Unit of mirroring work for one catalog entry.
#[derive(Debug, Clone)]
pub struct MirrorJob {
    pub slug: String,
    pub thumbnail_url: Option<String>,
    pub video_preview_url: Option<String>,
    /// `YYYY/MM/DD` (UTC), fixed when the job is created
    pub date_partition: String,
    /// Used as the object name when the downloaded body is empty
    pub filename_seed: String,
    /// Fetch fresh URLs from the remote before downloading
    pub refresh: bool,
    pub status: MirrorJobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl MirrorJob {
    pub fn new(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            filename_seed: slug.clone(),
            slug,
            thumbnail_url: None,
            video_preview_url: None,
            date_partition: chrono::Utc::now().format("%Y/%m/%d").to_string(),
            refresh: false,
            status: MirrorJobStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn with_url(mut self, kind: MediaKind, url: impl Into<String>) -> Self {
        *self.url_mut(kind) = Some(url.into());
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Job for every transient reference `entry` still holds, if any.
    pub fn from_entry(entry: &CatalogEntry) -> Option<Self> {
        let pending = entry.pending_media();
        if pending.is_empty() {
            return None;
        }

        Some(
            pending
                .into_iter()
                .fold(Self::new(&entry.slug), |job, (kind, url)| job.with_url(kind, url)),
        )
    }

    pub fn url(&self, kind: MediaKind) -> Option<&str> {
        match kind {
            MediaKind::Thumbnail => self.thumbnail_url.as_deref(),
            MediaKind::VideoPreview => self.video_preview_url.as_deref(),
        }
    }

    fn url_mut(&mut self, kind: MediaKind) -> &mut Option<String> {
        match kind {
            MediaKind::Thumbnail => &mut self.thumbnail_url,
            MediaKind::VideoPreview => &mut self.video_preview_url,
        }
    }

    /// Kinds that still need mirroring.
    pub fn pending_kinds(&self) -> Vec<MediaKind> {
        MediaKind::ALL
            .into_iter()
            .filter(|kind| self.url(*kind).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.thumbnail_url.is_none() && self.video_preview_url.is_none()
    }

    /// Fold a later job for the same slug into this one.
    fn merge(&mut self, other: MirrorJob) {
        for kind in MediaKind::ALL {
            if let Some(url) = other.url(kind) {
                let slot = self.url_mut(kind);
                if slot.is_none() {
                    *slot = Some(url.to_string());
                }
            }
        }
        self.refresh |= other.refresh;
    }

    /// Backoff before the next attempt: `initial * 2^(attempts - 1)`.
    pub fn backoff(&self, initial: Duration) -> Duration {
        initial.saturating_mul(2u32.saturating_pow(self.attempts.saturating_sub(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMirror {
    pub slug: String,
    pub attempts: u32,
    pub error: String,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorReport {
    pub completed: usize,
    pub failed: Vec<FailedMirror>,
}

#[derive(Debug, Clone)]
pub struct MirrorQueueConfig {
    /// Parallel jobs during drain
    pub concurrency: usize,
    /// Attempt ceiling per job
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles afterwards
    pub initial_backoff: Duration,
}

impl Default for MirrorQueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Collaborators shared by every worker.
struct MirrorWorker {
    host: Arc<dyn RemoteHost>,
    session: Session,
    http_client: Arc<dyn HttpClient>,
    storage: Arc<dyn ObjectStorage>,
    repository: Arc<dyn CatalogRepository>,
    max_attempts: u32,
    initial_backoff: Duration,
}

/// Slug-keyed mirror queue.
pub struct MediaMirrorQueue {
    worker: Arc<MirrorWorker>,
    concurrency: usize,
    jobs: BTreeMap<String, MirrorJob>,
}

impl MediaMirrorQueue {
    pub fn new(
        host: Arc<dyn RemoteHost>,
        session: Session,
        http_client: Arc<dyn HttpClient>,
        storage: Arc<dyn ObjectStorage>,
        repository: Arc<dyn CatalogRepository>,
        config: MirrorQueueConfig,
    ) -> Self {
        Self {
            worker: Arc::new(MirrorWorker {
                host,
                session,
                http_client,
                storage,
                repository,
                max_attempts: config.max_attempts.max(1),
                initial_backoff: config.initial_backoff,
            }),
            concurrency: config.concurrency.max(1),
            jobs: BTreeMap::new(),
        }
    }

    /// Add a job, merging it into any queued job for the same slug.
    ///
    /// Returns `true` if the slug was not queued yet.
    pub fn enqueue(&mut self, job: MirrorJob) -> bool {
        if job.is_empty() {
            return false;
        }

        match self.jobs.get_mut(&job.slug) {
            Some(existing) => {
                debug!(slug = %job.slug, "Merging mirror job");
                existing.merge(job);
                false
            }
            None => {
                debug!(slug = %job.slug, kinds = ?job.pending_kinds(), "Enqueued mirror job");
                self.jobs.insert(job.slug.clone(), job);
                true
            }
        }
    }

    pub fn get(&self, slug: &str) -> Option<&MirrorJob> {
        self.jobs.get(slug)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Run every queued job to a terminal state with the configured
    /// concurrency. The queue is empty afterwards.
    pub async fn drain(&mut self) -> MirrorReport {
        self.drain_with(self.concurrency).await
    }

    /// Like [`drain`](Self::drain) with an explicit concurrency.
    #[instrument(skip(self), fields(jobs = self.jobs.len()))]
    pub async fn drain_with(&mut self, concurrency: usize) -> MirrorReport {
        let mut report = MirrorReport::default();
        if self.jobs.is_empty() {
            return report;
        }

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (_, job) in std::mem::take(&mut self.jobs) {
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                worker.run(job).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(job) if job.status == MirrorJobStatus::Completed => report.completed += 1,
                Ok(job) => report.failed.push(FailedMirror {
                    error: job
                        .last_error
                        .unwrap_or_else(|| "unknown error".to_string()),
                    slug: job.slug,
                    attempts: job.attempts,
                }),
                Err(e) => {
                    error!(error = %e, "Mirror worker aborted");
                    report.failed.push(FailedMirror {
                        slug: "<unknown>".to_string(),
                        attempts: 0,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.failed.sort_by(|a, b| a.slug.cmp(&b.slug));
        info!(
            completed = report.completed,
            failed = report.failed.len(),
            "Mirror queue drained"
        );
        report
    }
}

impl MirrorWorker {
    #[instrument(skip(self, job), fields(slug = %job.slug))]
    async fn run(&self, mut job: MirrorJob) -> MirrorJob {
        loop {
            job.status = MirrorJobStatus::Uploading;
            let result = self.attempt(&mut job).await;

            match result {
                Ok(()) => {
                    job.attempts += 1;
                    job.status = MirrorJobStatus::Completed;
                    job.last_error = None;
                    debug!(attempts = job.attempts, "Mirror job completed");
                    return job;
                }
                // The remote file is gone; refreshed links will never appear.
                Err(SyncError::NotFound(what)) => {
                    warn!(%what, "Remote file no longer exists, giving up");
                    job.status = MirrorJobStatus::PermanentlyFailed;
                    job.last_error = Some(format!("remote file not found: {}", what));
                    return job;
                }
                Err(e) => {
                    job.attempts += 1;
                    job.last_error = Some(e.to_string());

                    if !e.is_retryable() || job.attempts >= self.max_attempts {
                        warn!(
                            attempts = job.attempts,
                            error = %e,
                            "Mirror job permanently failed"
                        );
                        job.status = MirrorJobStatus::PermanentlyFailed;
                        return job;
                    }

                    let delay = job.backoff(self.initial_backoff);
                    debug!(
                        attempts = job.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Mirror attempt failed, retrying"
                    );
                    job.status = MirrorJobStatus::Retrying;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self, job: &mut MirrorJob) -> Result<()> {
        if job.refresh {
            self.refresh_urls(job).await?;
        }

        for kind in job.pending_kinds() {
            let Some(url) = job.url(kind).map(str::to_string) else {
                continue;
            };

            let (body, content_type) = match self.download(&url).await {
                Ok(downloaded) => downloaded,
                Err(DownloadError::Expired(status)) => {
                    debug!(
                        kind = kind.as_str(),
                        url = strip_query(&url),
                        status,
                        "Preview link expired, refreshing before retry"
                    );
                    job.refresh = true;
                    return Err(SyncError::Transient(format!(
                        "{} link expired (status {})",
                        kind.as_str(),
                        status
                    )));
                }
                Err(DownloadError::Failed(e)) => return Err(e),
            };

            let key = storage_key(kind, job, &url, &body, content_type.as_deref());
            let stored = self
                .storage
                .upload(body, &key, content_type.as_deref())
                .await
                .map_err(|e| SyncError::Upload(e.to_string()))?;

            if !self
                .repository
                .set_media_ref(&job.slug, kind, &stored)
                .await?
            {
                warn!(kind = kind.as_str(), "Catalog entry vanished before its media was recorded");
            }

            debug!(kind = kind.as_str(), key = %stored, "Mirrored media");
            *job.url_mut(kind) = None;
        }

        Ok(())
    }

    /// Replace pending URLs with fresh ones from the remote.
    async fn refresh_urls(&self, job: &mut MirrorJob) -> Result<()> {
        let info = self
            .host
            .get_file_detail(&self.session, &job.slug)
            .await?;

        for (kind, fresh) in [
            (MediaKind::Thumbnail, info.thumbnail_url),
            (MediaKind::VideoPreview, info.video_preview_url),
        ] {
            if let Some(fresh) = fresh {
                let slot = job.url_mut(kind);
                if slot.is_some() {
                    *slot = Some(fresh);
                }
            }
        }

        job.refresh = false;
        Ok(())
    }

    async fn download(&self, url: &str) -> std::result::Result<(Bytes, Option<String>), DownloadError> {
        let request = HttpRequest::new(HttpMethod::Get, url).timeout(DOWNLOAD_TIMEOUT);

        // The job loop owns retries.
        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::single_attempt())
            .await
            .map_err(|e| DownloadError::Failed(SyncError::Transient(e.to_string())))?;

        match response.status {
            403 | 410 => Err(DownloadError::Expired(response.status)),
            _ if response.is_success() => {
                let content_type = response.content_type().map(str::to_string);
                Ok((response.body, content_type))
            }
            status => Err(DownloadError::Failed(SyncError::Transient(format!(
                "download returned status {}",
                status
            )))),
        }
    }
}

enum DownloadError {
    Expired(u16),
    Failed(SyncError),
}

/// `<kind prefix>/<date partition>/<sha256 of body | seed>.<ext>`
fn storage_key(
    kind: MediaKind,
    job: &MirrorJob,
    url: &str,
    body: &[u8],
    content_type: Option<&str>,
) -> String {
    let name = if body.is_empty() {
        job.filename_seed.clone()
    } else {
        hex::encode(Sha256::digest(body))
    };

    format!(
        "{}/{}/{}.{}",
        kind.storage_prefix(),
        job.date_partition,
        name,
        media_extension(kind, url, content_type)
    )
}

/// Extension from the URL path, then the content type, then a per-kind default.
fn media_extension(kind: MediaKind, url: &str, content_type: Option<&str>) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let from_url = path
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_url {
        return ext;
    }

    let from_type = content_type.and_then(|ct| match ct.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        _ => None,
    });

    from_type
        .unwrap_or(match kind {
            MediaKind::Thumbnail => "jpg",
            MediaKind::VideoPreview => "mp4",
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_merges_by_slug() {
        let mut first = MirrorJob::new("v1").with_url(MediaKind::Thumbnail, "https://h/t.jpg");
        first.merge(
            MirrorJob::new("v1")
                .with_url(MediaKind::Thumbnail, "https://h/other.jpg")
                .with_url(MediaKind::VideoPreview, "https://h/p.mp4")
                .with_refresh(true),
        );

        assert_eq!(first.thumbnail_url.as_deref(), Some("https://h/t.jpg"));
        assert_eq!(first.video_preview_url.as_deref(), Some("https://h/p.mp4"));
        assert!(first.refresh);
        assert_eq!(
            first.pending_kinds(),
            vec![MediaKind::Thumbnail, MediaKind::VideoPreview]
        );
    }

    #[test]
    fn test_job_from_entry_uses_transient_refs() {
        let mut entry = CatalogEntry::new(
            "v1",
            "ep1.mp4",
            "anime",
            false,
            core_catalog::ContentType::Video,
        );
        assert!(MirrorJob::from_entry(&entry).is_none());

        entry.thumbnail_ref = Some("thumbnails/2024/01/01/abc.jpg".into());
        entry.video_preview_ref = Some("https://h/p.mp4".into());
        let job = MirrorJob::from_entry(&entry).unwrap();

        assert_eq!(job.pending_kinds(), vec![MediaKind::VideoPreview]);
        assert_eq!(job.filename_seed, "v1");
    }

    #[test]
    fn test_backoff_doubles() {
        let mut job = MirrorJob::new("v1");
        let initial = Duration::from_millis(100);

        job.attempts = 1;
        assert_eq!(job.backoff(initial), Duration::from_millis(100));
        job.attempts = 3;
        assert_eq!(job.backoff(initial), Duration::from_millis(400));
    }

    #[test]
    fn test_status_terminal() {
        assert!(MirrorJobStatus::Completed.is_terminal());
        assert!(MirrorJobStatus::PermanentlyFailed.is_terminal());
        assert!(!MirrorJobStatus::Retrying.is_terminal());
        assert_eq!(MirrorJobStatus::PermanentlyFailed.as_str(), "permanently_failed");
    }

    #[test]
    fn test_storage_key_layout() {
        let mut job = MirrorJob::new("v1");
        job.date_partition = "2024/05/17".into();

        let key = storage_key(
            MediaKind::Thumbnail,
            &job,
            "https://cdn/x/thumb.PNG?sig=abc",
            b"hello",
            Some("image/png"),
        );
        assert_eq!(
            key,
            "thumbnails/2024/05/17/2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824.png"
        );

        let key = storage_key(MediaKind::VideoPreview, &job, "https://cdn/preview", b"", None);
        assert_eq!(key, "video-previews/2024/05/17/v1.mp4");
    }

    #[test]
    fn test_media_extension_from_content_type() {
        assert_eq!(
            media_extension(MediaKind::Thumbnail, "https://cdn/get?id=1", Some("image/webp")),
            "webp"
        );
        assert_eq!(
            media_extension(MediaKind::Thumbnail, "https://cdn/get", None),
            "jpg"
        );
    }
}
