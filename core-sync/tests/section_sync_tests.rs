//! Integration tests for section sync
//!
//! These tests drive the orchestrator end to end against in-memory fakes:
//! - Tree walk, classification, subtitle pairing and episode numbering
//! - Idempotent re-runs
//! - Media mirroring with retries, link refresh and crash recovery
//! - Per-section and per-run failure handling

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    HttpClient, HttpRequest, HttpResponse, ObjectStorage, RemoteEntry, RemoteFileInfo,
    RemoteHost, Session,
};
use bytes::Bytes;
use core_catalog::{
    create_test_pool, CatalogRepository, ContentType, MediaKind, MediaRef, SqliteCatalogRepository,
};
use core_runtime::config::SectionConfig;
use core_sync::{
    MediaMirrorQueue, MirrorJob, MirrorQueueConfig, SyncConfig, SyncError, SyncOrchestrator,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeRemoteHost {
    folders: Mutex<HashMap<Option<String>, Vec<RemoteEntry>>>,
    details: Mutex<HashMap<String, RemoteFileInfo>>,
    reject_login: AtomicBool,
    reject_details: AtomicBool,
    list_calls: AtomicUsize,
    detail_calls: Mutex<HashMap<String, usize>>,
}

impl FakeRemoteHost {
    fn set_folder(&self, slug: Option<&str>, children: Vec<RemoteEntry>) {
        self.folders
            .lock()
            .unwrap()
            .insert(slug.map(str::to_string), children);
    }

    fn set_detail(&self, slug: &str, info: RemoteFileInfo) {
        self.details.lock().unwrap().insert(slug.to_string(), info);
    }

    fn detail_calls(&self, slug: &str) -> usize {
        self.detail_calls
            .lock()
            .unwrap()
            .get(slug)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl RemoteHost for FakeRemoteHost {
    async fn login(&self) -> BridgeResult<Session> {
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(BridgeError::Unauthorized("bad password".into()));
        }
        Ok(Session::new("session-token"))
    }

    async fn list_folder(&self, _session: &Session, slug: Option<&str>) -> BridgeResult<Vec<RemoteEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.folders
            .lock()
            .unwrap()
            .get(&slug.map(str::to_string))
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(slug.unwrap_or("<root>").to_string()))
    }

    async fn get_file_detail(&self, _session: &Session, slug: &str) -> BridgeResult<RemoteFileInfo> {
        *self
            .detail_calls
            .lock()
            .unwrap()
            .entry(slug.to_string())
            .or_default() += 1;

        if self.reject_details.load(Ordering::SeqCst) {
            return Err(BridgeError::Unauthorized("token expired".into()));
        }

        self.details
            .lock()
            .unwrap()
            .get(slug)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(slug.to_string()))
    }
}

/// Serves every URL with its own bytes; URLs in `expire_once` answer 403 the
/// first time they are requested.
#[derive(Default)]
struct FakeHttpClient {
    expire_once: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
}

impl FakeHttpClient {
    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.url.clone());

        if self.expire_once.lock().unwrap().remove(&request.url) {
            return Ok(HttpResponse {
                status: 403,
                headers: HashMap::new(),
                body: Bytes::from_static(b"expired"),
            });
        }

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "image/jpeg".to_string());
        Ok(HttpResponse {
            status: 200,
            headers,
            body: Bytes::from(format!("bytes of {}", request.url)),
        })
    }
}

#[derive(Default)]
struct MemoryObjectStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    failing: AtomicBool,
    uploads: AtomicUsize,
    upload_delay_ms: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryObjectStorage {
    fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, data: Bytes, key: &str, _content_type: Option<&str>) -> BridgeResult<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = self.upload_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("bucket unavailable".into()));
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(key.to_string())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn folder(slug: &str, name: &str) -> RemoteEntry {
    RemoteEntry {
        slug: slug.to_string(),
        name: name.to_string(),
        is_folder: true,
        size: None,
    }
}

fn file(slug: &str, name: &str) -> RemoteEntry {
    RemoteEntry {
        slug: slug.to_string(),
        name: name.to_string(),
        is_folder: false,
        size: Some(2048),
    }
}

fn detail(name: &str, thumbnail: Option<&str>, preview: Option<&str>) -> RemoteFileInfo {
    RemoteFileInfo {
        name: name.to_string(),
        extension: name.rsplit_once('.').map(|(_, ext)| ext.to_string()),
        size: Some(2048),
        duration_seconds: Some(1440.0),
        thumbnail_url: thumbnail.map(str::to_string),
        video_preview_url: preview.map(str::to_string),
        ..RemoteFileInfo::default()
    }
}

/// root -> Anime -> Season 1 -> { show.s01e01.mp4, its .eng.srt, an
/// unpaired .vie.srt, bonus.mkv }
fn anime_tree() -> FakeRemoteHost {
    let host = FakeRemoteHost::default();
    host.set_folder(None, vec![folder("anime", "Anime"), folder("docs", "Docs")]);
    host.set_folder(Some("anime"), vec![folder("s1", "Season 1")]);
    host.set_folder(Some("docs"), vec![]);
    host.set_folder(
        Some("s1"),
        vec![
            file("v1", "show.s01e01.mp4"),
            file("sub1", "show.s01e01.eng.srt"),
            file("sub5", "show.s01e05.vie.srt"),
            file("v2", "bonus.mkv"),
        ],
    );
    host.set_detail(
        "v1",
        detail(
            "show.s01e01.mp4",
            Some("https://cdn.example/v1/thumb.jpg"),
            Some("https://cdn.example/v1/preview.mp4"),
        ),
    );
    host.set_detail("sub5", detail("show.s01e05.vie.srt", None, None));
    host.set_detail(
        "v2",
        detail("bonus.mkv", Some("https://cdn.example/v2/thumb.jpg"), None),
    );
    host
}

struct Harness {
    host: Arc<FakeRemoteHost>,
    http: Arc<FakeHttpClient>,
    storage: Arc<MemoryObjectStorage>,
    repository: Arc<SqliteCatalogRepository>,
    orchestrator: SyncOrchestrator,
}

fn test_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.detail_fetch_delay = Duration::ZERO;
    config.mirror.initial_backoff = Duration::from_millis(1);
    config
}

async fn harness(host: FakeRemoteHost) -> Harness {
    let pool = create_test_pool().await.unwrap();
    let repository = Arc::new(SqliteCatalogRepository::new(pool));
    let host = Arc::new(host);
    let http = Arc::new(FakeHttpClient::default());
    let storage = Arc::new(MemoryObjectStorage::default());

    let orchestrator = SyncOrchestrator::new(
        host.clone(),
        http.clone(),
        storage.clone(),
        repository.clone(),
        test_config(),
    );

    Harness {
        host,
        http,
        storage,
        repository,
        orchestrator,
    }
}

fn mirror_queue(h: &Harness) -> MediaMirrorQueue {
    MediaMirrorQueue::new(
        h.host.clone(),
        Session::new("t"),
        h.http.clone(),
        h.storage.clone(),
        h.repository.clone(),
        MirrorQueueConfig {
            initial_backoff: Duration::from_millis(1),
            ..MirrorQueueConfig::default()
        },
    )
}

fn anime_section() -> Vec<SectionConfig> {
    vec![SectionConfig::new("anime", "Anime")]
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_sync_builds_catalog_and_mirrors_media() {
    let h = harness(anime_tree()).await;

    let report = h.orchestrator.run(&anime_section()).await.unwrap();
    let section = report.section("anime").unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(section.folders_created, 2);
    assert_eq!(section.files_created, 3);
    assert_eq!(section.files_skipped, 0);
    assert_eq!(section.mirrors_completed, 2);
    assert_eq!(section.mirrors_failed, 0);
    assert_eq!(h.storage.object_count(), 3);
    assert_eq!(h.repository.count_by_section("anime").await.unwrap(), 5);

    let root = h.repository.find_by_slug("anime").await.unwrap().unwrap();
    assert_eq!(root.parent_id, None);
    assert_eq!(root.file_path, "/Anime");

    let season = h.repository.find_by_slug("s1").await.unwrap().unwrap();
    assert_eq!(season.parent_id.as_deref(), Some(root.id.as_str()));
    assert_eq!(season.slug_path, "anime/anime/season-1");

    let v1 = h.repository.find_by_slug("v1").await.unwrap().unwrap();
    assert_eq!(v1.content_type, ContentType::Video);
    assert_eq!(v1.parent_id.as_deref(), Some(season.id.as_str()));
    assert_eq!(v1.metadata["episode_number"], 1);
    assert_eq!(v1.metadata["has_subtitles"], true);
    assert_eq!(v1.metadata["subtitles"][0]["language"], "eng");
    assert_eq!(v1.metadata["subtitles"][0]["label"], "English");
    assert_eq!(v1.metadata["subtitles"][0]["slug"], "sub1");
    assert!(!v1.metadata.contains_key("thumbnail_temp_url"));
    assert!(matches!(
        v1.media_ref(MediaKind::Thumbnail),
        Some(MediaRef::Permanent(key)) if key.starts_with("thumbnails/") && key.ends_with(".jpg")
    ));
    assert!(matches!(
        v1.media_ref(MediaKind::VideoPreview),
        Some(MediaRef::Permanent(key)) if key.starts_with("video-previews/")
    ));

    // Paired subtitles are not entries of their own.
    assert!(h.repository.find_by_slug("sub1").await.unwrap().is_none());
    let unpaired = h.repository.find_by_slug("sub5").await.unwrap().unwrap();
    assert_eq!(unpaired.content_type, ContentType::Other);

    // "show.s01e01" takes 1, so the unnumbered bonus video gets 2.
    let v2 = h.repository.find_by_slug("v2").await.unwrap().unwrap();
    assert_eq!(v2.metadata["episode_number"], 2);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let h = harness(anime_tree()).await;

    h.orchestrator.run(&anime_section()).await.unwrap();
    let downloads_after_first = h.http.request_count();

    let report = h.orchestrator.run(&anime_section()).await.unwrap();
    let section = report.section("anime").unwrap();

    assert_eq!(section.folders_created, 0);
    assert_eq!(section.files_created, 0);
    assert_eq!(section.folders_updated, 2);
    assert_eq!(section.files_updated, 3);
    assert_eq!(section.mirrors_completed, 0);
    assert_eq!(h.http.request_count(), downloads_after_first);
    assert_eq!(h.repository.count_by_section("anime").await.unwrap(), 5);
}

#[tokio::test]
async fn test_missing_detail_skips_file() {
    let host = anime_tree();
    host.details.lock().unwrap().remove("v2");
    let h = harness(host).await;

    let report = h.orchestrator.run(&anime_section()).await.unwrap();
    let section = report.section("anime").unwrap();

    assert_eq!(section.files_created, 2);
    assert_eq!(section.files_skipped, 1);
    assert!(h.repository.find_by_slug("v2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failing_upload_stops_at_attempt_ceiling() {
    let host = FakeRemoteHost::default();
    host.set_folder(Some("root"), vec![file("v1", "ep01.mp4")]);
    host.set_detail(
        "v1",
        detail("ep01.mp4", Some("https://cdn.example/t.jpg"), None),
    );
    let h = harness(host).await;
    h.storage.failing.store(true, Ordering::SeqCst);

    let report = h
        .orchestrator
        .run(&[SectionConfig::new("anime", "root")])
        .await
        .unwrap();
    let section = report.section("anime").unwrap();

    assert_eq!(section.mirrors_completed, 0);
    assert_eq!(section.mirrors_failed, 1);
    assert_eq!(section.failed_mirrors[0].slug, "v1");
    assert_eq!(section.failed_mirrors[0].attempts, 3);
    assert_eq!(h.storage.uploads.load(Ordering::SeqCst), 3);

    // The transient link stays recorded for the next run.
    let v1 = h.repository.find_by_slug("v1").await.unwrap().unwrap();
    assert!(matches!(v1.media_ref(MediaKind::Thumbnail), Some(MediaRef::Transient(_))));
}

#[tokio::test]
async fn test_pending_media_recovered_on_next_run() {
    let host = FakeRemoteHost::default();
    host.set_folder(Some("root"), vec![file("v1", "ep01.mp4")]);
    host.set_detail(
        "v1",
        detail("ep01.mp4", Some("https://cdn.example/old.jpg"), None),
    );
    let h = harness(host).await;
    let sections = [SectionConfig::new("anime", "root")];

    h.storage.failing.store(true, Ordering::SeqCst);
    h.orchestrator.run(&sections).await.unwrap();

    // The file vanished from the listing, but its detail still resolves with
    // a fresh link; only the recovery re-scan can pick it up.
    h.host.set_folder(Some("root"), vec![]);
    h.host.set_detail(
        "v1",
        detail("ep01.mp4", Some("https://cdn.example/fresh.jpg"), None),
    );
    h.storage.failing.store(false, Ordering::SeqCst);

    let report = h.orchestrator.run(&sections).await.unwrap();
    let section = report.section("anime").unwrap();

    assert_eq!(section.mirrors_completed, 1);
    assert_eq!(section.files_created + section.files_updated, 0);
    assert!(h
        .http
        .requests
        .lock()
        .unwrap()
        .last()
        .is_some_and(|url| url == "https://cdn.example/fresh.jpg"));

    let v1 = h.repository.find_by_slug("v1").await.unwrap().unwrap();
    assert!(v1.media_ref(MediaKind::Thumbnail).unwrap().is_permanent());
}

#[tokio::test]
async fn test_expired_link_refreshes_before_retry() {
    let host = FakeRemoteHost::default();
    host.set_folder(Some("root"), vec![file("v1", "ep01.mp4")]);
    host.set_detail(
        "v1",
        detail("ep01.mp4", Some("https://cdn.example/t.jpg"), None),
    );
    let h = harness(host).await;
    h.http
        .expire_once
        .lock()
        .unwrap()
        .insert("https://cdn.example/t.jpg".to_string());

    let report = h
        .orchestrator
        .run(&[SectionConfig::new("anime", "root")])
        .await
        .unwrap();

    assert_eq!(report.section("anime").unwrap().mirrors_completed, 1);
    assert_eq!(h.http.request_count(), 2);
    // Once during the walk, once to refresh the expired link.
    assert_eq!(h.host.detail_calls("v1"), 2);
}

#[tokio::test]
async fn test_unresolvable_section_does_not_stop_others() {
    let h = harness(anime_tree()).await;

    let report = h
        .orchestrator
        .run(&[
            SectionConfig::new("movies", "Movies/Nowhere"),
            SectionConfig::new("anime", "Anime"),
        ])
        .await
        .unwrap();

    assert!(report.is_failed("movies"));
    assert!(report.is_unresolved("movies"));
    assert_eq!(report.failures[0].reference, "Movies/Nowhere");
    assert!(!report.is_failed("anime"));
    assert!(!report.is_unresolved("anime"));
    assert_eq!(report.section("anime").unwrap().files_created, 3);
}

#[tokio::test]
async fn test_login_failure_aborts_run() {
    let host = anime_tree();
    host.reject_login.store(true, Ordering::SeqCst);
    let h = harness(host).await;

    let err = h.orchestrator.run(&anime_section()).await.unwrap_err();

    assert!(matches!(err, SyncError::Auth(_)));
    assert_eq!(h.host.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_session_mid_walk_aborts_run() {
    let host = anime_tree();
    host.reject_details.store(true, Ordering::SeqCst);
    let h = harness(host).await;

    let err = h.orchestrator.run(&anime_section()).await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_walk_survives_folder_cycle() {
    let host = FakeRemoteHost::default();
    host.set_folder(Some("root"), vec![folder("a", "A")]);
    host.set_folder(Some("a"), vec![folder("root", "Back To Root"), folder("b", "B")]);
    host.set_folder(Some("b"), vec![folder("a", "A again")]);
    let h = harness(host).await;

    let report = h
        .orchestrator
        .run(&[SectionConfig::new("anime", "root").with_display_name("Anime")])
        .await
        .unwrap();

    // root, a, b
    assert_eq!(report.section("anime").unwrap().folders_created, 3);
    let root = h.repository.find_by_slug("root").await.unwrap().unwrap();
    assert_eq!(root.title, "Anime");
    assert_eq!(root.parent_id, None);
}

#[tokio::test]
async fn test_queue_merges_jobs_for_one_slug() {
    let h = harness(FakeRemoteHost::default()).await;
    let upserter = core_catalog::CatalogUpserter::new(h.repository.clone());
    let (_, season) = upserter
        .upsert_folder(
            core_catalog::FolderUpsert {
                slug: "s1".into(),
                title: "Season 1".into(),
                section: "anime".into(),
                parent_folder_slug: None,
            },
            core_catalog::Placement::Root { ancestors: &[] },
        )
        .await
        .unwrap();
    upserter
        .upsert_file(
            core_catalog::FileUpsert {
                slug: "v1".into(),
                title: "ep01.mp4".into(),
                section: "anime".into(),
                content_type: ContentType::Video,
                extension: Some("mp4".into()),
                file_size_bytes: None,
                duration_seconds: None,
                mime_type: None,
                thumbnail_url: Some("https://cdn.example/t.jpg".into()),
                video_preview_url: Some("https://cdn.example/p.mp4".into()),
                parent_folder_slug: Some("s1".into()),
                metadata: serde_json::Map::new(),
            },
            core_catalog::Placement::Under(&season),
        )
        .await
        .unwrap();

    let mut queue = MediaMirrorQueue::new(
        h.host.clone(),
        Session::new("t"),
        h.http.clone(),
        h.storage.clone(),
        h.repository.clone(),
        MirrorQueueConfig::default(),
    );

    assert!(queue.enqueue(MirrorJob::new("v1").with_url(MediaKind::Thumbnail, "https://cdn.example/t.jpg")));
    assert!(!queue.enqueue(MirrorJob::new("v1").with_url(MediaKind::VideoPreview, "https://cdn.example/p.mp4")));
    assert_eq!(queue.len(), 1);

    let report = queue.drain_with(2).await;

    assert_eq!(report.completed, 1);
    assert!(queue.is_empty());
    assert_eq!(h.storage.object_count(), 2);
    let v1 = h.repository.find_by_slug("v1").await.unwrap().unwrap();
    assert!(v1.pending_media().is_empty());
}

#[tokio::test]
async fn test_vanished_file_fails_without_using_attempts() {
    let h = harness(FakeRemoteHost::default()).await;
    let mut queue = mirror_queue(&h);

    queue.enqueue(
        MirrorJob::new("gone")
            .with_url(MediaKind::Thumbnail, "https://cdn.example/gone.jpg")
            .with_refresh(true),
    );
    let report = queue.drain().await;

    assert_eq!(report.completed, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].slug, "gone");
    assert_eq!(report.failed[0].attempts, 0);
    assert_eq!(h.host.detail_calls("gone"), 1);
    assert_eq!(h.http.request_count(), 0);
    assert_eq!(h.storage.uploads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_drain_respects_concurrency_bound() {
    let h = harness(FakeRemoteHost::default()).await;
    h.storage.upload_delay_ms.store(20, Ordering::SeqCst);
    let mut queue = mirror_queue(&h);

    for n in 0..12 {
        queue.enqueue(
            MirrorJob::new(format!("v{}", n))
                .with_url(MediaKind::Thumbnail, format!("https://cdn.example/{}.jpg", n)),
        );
    }
    let report = queue.drain_with(3).await;

    assert_eq!(report.completed, 12);
    assert!(report.failed.is_empty());
    assert_eq!(h.storage.uploads.load(Ordering::SeqCst), 12);
    assert_eq!(h.storage.peak_in_flight.load(Ordering::SeqCst), 3);
}
