//! End-to-end tests of the directional sync executor over an in-memory
//! catalog, a temp-dir cache, and scripted mock adapters.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::DatabaseConnection;

use fitsync::cache::FileCacheStore;
use fitsync::catalog::{self, settings};
use fitsync::connect_and_migrate;
use fitsync::entity::prelude::*;
use fitsync::fingerprint::fingerprint;
use fitsync::platform::{
    AdapterError, AdapterInfo, AdapterRegistry, Health, PlatformAdapter, SourceActivity,
    UploadMetadata, UploadOutcome,
};
use fitsync::sync::{
    CancelFlag, Direction, DirectionEnd, SyncContext, SyncOptions, sync_direction,
};
use fitsync::transcode::{NullTranscoder, TranscodeError, Transcoder};

// ─── Mock adapters ───────────────────────────────────────────────────────────

struct MockSource {
    platform: Platform,
    activities: Vec<SourceActivity>,
    downloads: HashMap<String, Vec<u8>>,
    download_calls: Mutex<Vec<String>>,
}

impl MockSource {
    fn new(platform: Platform, activities: Vec<SourceActivity>) -> Self {
        Self {
            platform,
            activities,
            downloads: HashMap::new(),
            download_calls: Mutex::new(Vec::new()),
        }
    }

    fn with_download(mut self, platform_id: &str, bytes: &[u8]) -> Self {
        self.downloads.insert(platform_id.to_string(), bytes.to_vec());
        self
    }

    fn download_calls(&self) -> Vec<String> {
        self.download_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            platform: self.platform,
            list_cost: 1,
            download_cost: 1,
            upload_cost: 1,
        }
    }

    fn supported_upload_formats(&self) -> Vec<FileFormat> {
        vec![FileFormat::Fit]
    }

    async fn list_activities(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceActivity>, AdapterError> {
        let mut matching: Vec<SourceActivity> = self
            .activities
            .iter()
            .filter(|a| a.start_time >= since && a.start_time <= until)
            .cloned()
            .collect();
        matching.truncate(limit);
        Ok(matching)
    }

    async fn download(
        &self,
        platform_id: &str,
        _preferred: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat), AdapterError> {
        self.download_calls
            .lock()
            .unwrap()
            .push(platform_id.to_string());
        match self.downloads.get(platform_id) {
            Some(bytes) => Ok((bytes.clone(), FileFormat::Fit)),
            None => Err(AdapterError::no_original_file(platform_id)),
        }
    }

    async fn upload(
        &self,
        _bytes: &[u8],
        _format: FileFormat,
        _metadata: &UploadMetadata,
    ) -> Result<UploadOutcome, AdapterError> {
        Err(AdapterError::api("mock source does not accept uploads"))
    }

    async fn health_check(&self) -> Health {
        Health::Ok
    }
}

struct MockTarget {
    platform: Platform,
    supported: Vec<FileFormat>,
    preferred: Option<FileFormat>,
    /// Scripted outcomes, FIFO; defaults to `Accepted` with generated ids.
    outcomes: Mutex<VecDeque<UploadOutcome>>,
    uploads: Mutex<Vec<(FileFormat, Vec<u8>)>>,
    /// Raise the flag after this many uploads, simulating Ctrl+C.
    cancel_after: Option<(usize, CancelFlag)>,
}

impl MockTarget {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            supported: vec![FileFormat::Fit, FileFormat::Tcx, FileFormat::Gpx],
            preferred: None,
            outcomes: Mutex::new(VecDeque::new()),
            uploads: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    fn preferring(mut self, format: FileFormat) -> Self {
        self.preferred = Some(format);
        self
    }

    fn with_outcome(self, outcome: UploadOutcome) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    fn cancelling_after(mut self, uploads: usize, cancel: CancelFlag) -> Self {
        self.cancel_after = Some((uploads, cancel));
        self
    }

    fn uploads(&self) -> Vec<(FileFormat, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockTarget {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            platform: self.platform,
            list_cost: 1,
            download_cost: 1,
            upload_cost: 1,
        }
    }

    fn supported_upload_formats(&self) -> Vec<FileFormat> {
        self.supported.clone()
    }

    fn preferred_upload_format(&self) -> Option<FileFormat> {
        self.preferred
    }

    async fn list_activities(
        &self,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<SourceActivity>, AdapterError> {
        Ok(Vec::new())
    }

    async fn download(
        &self,
        platform_id: &str,
        _preferred: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat), AdapterError> {
        Err(AdapterError::not_found(platform_id.to_string()))
    }

    async fn upload(
        &self,
        bytes: &[u8],
        format: FileFormat,
        _metadata: &UploadMetadata,
    ) -> Result<UploadOutcome, AdapterError> {
        let count = {
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push((format, bytes.to_vec()));
            uploads.len()
        };

        if let Some((after, cancel)) = &self.cancel_after {
            if count >= *after {
                cancel.request();
            }
        }

        let scripted = self.outcomes.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or(UploadOutcome::Accepted {
            remote_id: format!("R{count}"),
        }))
    }

    async fn health_check(&self) -> Health {
        Health::Ok
    }
}

/// Transcoder that downgrades FIT to GPX with recognizable bytes.
struct FakeTranscoder;

#[async_trait]
impl Transcoder for FakeTranscoder {
    fn supports(&self, from: FileFormat, to: FileFormat) -> bool {
        from == FileFormat::Fit && to == FileFormat::Gpx
    }

    async fn transcode(
        &self,
        _input: &[u8],
        from: FileFormat,
        to: FileFormat,
    ) -> Result<Vec<u8>, TranscodeError> {
        if !self.supports(from, to) {
            return Err(TranscodeError::Unsupported { from, to });
        }
        Ok(b"<gpx>converted</gpx>".to_vec())
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn ride(platform_id: &str, minutes_offset: i64) -> SourceActivity {
    SourceActivity {
        platform_id: platform_id.to_string(),
        name: format!("Ride {platform_id}"),
        sport: Sport::Ride,
        start_time: Utc.with_ymd_and_hms(2025, 1, 10, 6, 0, 0).unwrap()
            + Duration::minutes(minutes_offset),
        distance: 20034.0 + minutes_offset as f64 * 500.0,
        duration: 3612,
        elevation_gain: None,
        manual: false,
        available_formats: vec![FileFormat::Fit],
    }
}

struct Harness {
    db: DatabaseConnection,
    cache: FileCacheStore,
    registry: AdapterRegistry,
    _dir: tempfile::TempDir,
}

impl Harness {
    async fn new(adapters: Vec<Arc<dyn PlatformAdapter>>) -> Self {
        let db = connect_and_migrate("sqlite::memory:")
            .await
            .expect("catalog should migrate");
        let dir = tempfile::tempdir().expect("temp cache dir");
        let cache = FileCacheStore::new(dir.path());

        let mut registry = AdapterRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }

        Self {
            db,
            cache,
            registry,
            _dir: dir,
        }
    }

    fn ctx<'a>(&'a self, transcoder: &'a dyn Transcoder) -> SyncContext<'a> {
        SyncContext {
            db: &self.db,
            registry: &self.registry,
            cache: &self.cache,
            transcoder,
        }
    }
}

fn strava_to_garmin() -> Direction {
    Direction::new(Platform::Strava, Platform::Garmin)
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_sync_transfers_one_activity() {
    let activity = ride("S1", 0);
    let fp = fingerprint(&activity.facts());

    let source = Arc::new(
        MockSource::new(Platform::Strava, vec![activity.clone()]).with_download("S1", b"FITBYTES"),
    );
    let target = Arc::new(MockTarget::new(Platform::Garmin).with_outcome(
        UploadOutcome::Accepted {
            remote_id: "G1".to_string(),
        },
    ));

    let harness = Harness::new(vec![source.clone() as Arc<dyn PlatformAdapter>, target.clone()]).await;
    let report = sync_direction(
        &harness.ctx(&NullTranscoder),
        strava_to_garmin(),
        &SyncOptions::default(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.end, DirectionEnd::Completed);
    assert_eq!(report.counts.synced, 1);
    assert_eq!(report.counts.total(), 1);

    // The upload carried the downloaded FIT bytes.
    let uploads = target.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0], (FileFormat::Fit, b"FITBYTES".to_vec()));

    // Catalog state: record, both mappings, settled status, cursor.
    let record = catalog::get_activity(&harness.db, &fp).await.unwrap().unwrap();
    assert_eq!(record.sport_type, Sport::Ride);

    let source_mapping = catalog::get_mapping(&harness.db, &fp, Platform::Strava)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source_mapping.activity_id, "S1");
    let target_mapping = catalog::get_mapping(&harness.db, &fp, Platform::Garmin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(target_mapping.activity_id, "G1");

    let status = catalog::get_status(&harness.db, &fp, Platform::Strava, Platform::Garmin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, SyncState::Synced);

    assert_eq!(
        settings::last_cursor(&harness.db, Platform::Strava)
            .await
            .unwrap(),
        Some(activity.start_time)
    );
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let activity = ride("S1", 0);
    let source = Arc::new(
        MockSource::new(Platform::Strava, vec![activity]).with_download("S1", b"FITBYTES"),
    );
    let target = Arc::new(MockTarget::new(Platform::Garmin));

    let harness = Harness::new(vec![source.clone() as Arc<dyn PlatformAdapter>, target.clone()]).await;
    let ctx = harness.ctx(&NullTranscoder);
    let direction = strava_to_garmin();
    let options = SyncOptions::default();

    let first = sync_direction(&ctx, direction, &options, None).await.unwrap();
    assert_eq!(first.counts.synced, 1);

    let second = sync_direction(&ctx, direction, &options, None).await.unwrap();
    assert_eq!(second.end, DirectionEnd::Completed);
    assert_eq!(second.counts.total(), 0, "no state changes on re-run");
    assert_eq!(target.uploads().len(), 1, "no second upload");
}

#[tokio::test]
async fn destination_duplicate_is_terminal_success() {
    let activity = ride("S2", 0);
    let fp = fingerprint(&activity.facts());

    let source = Arc::new(
        MockSource::new(Platform::Strava, vec![activity]).with_download("S2", b"FITBYTES"),
    );
    let target = Arc::new(MockTarget::new(Platform::Garmin).with_outcome(UploadOutcome::Duplicate));

    let harness = Harness::new(vec![source as Arc<dyn PlatformAdapter>, target]).await;
    let report = sync_direction(
        &harness.ctx(&NullTranscoder),
        strava_to_garmin(),
        &SyncOptions::default(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.counts.duplicate, 1);

    let status = catalog::get_status(&harness.db, &fp, Platform::Strava, Platform::Garmin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, SyncState::Duplicate);

    // No target mapping is required for a duplicate.
    assert!(
        catalog::get_mapping(&harness.db, &fp, Platform::Garmin)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn manual_activity_is_skipped_without_a_download() {
    let mut activity = ride("S3", 0);
    activity.manual = true;
    activity.available_formats = vec![];
    let fp = fingerprint(&activity.facts());

    let source = Arc::new(MockSource::new(Platform::Strava, vec![activity]));
    let target = Arc::new(MockTarget::new(Platform::Garmin));

    let harness = Harness::new(vec![source.clone() as Arc<dyn PlatformAdapter>, target.clone()]).await;
    let report = sync_direction(
        &harness.ctx(&NullTranscoder),
        strava_to_garmin(),
        &SyncOptions::default(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.counts.skipped, 1);
    assert!(source.download_calls().is_empty(), "no download attempted");
    assert!(target.uploads().is_empty());

    let status = catalog::get_status(&harness.db, &fp, Platform::Strava, Platform::Garmin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, SyncState::Skipped);
    assert_eq!(status.reason.as_deref(), Some("no_source_file"));

    // The activity is still cataloged so it is not re-evaluated forever.
    assert!(catalog::get_activity(&harness.db, &fp).await.unwrap().is_some());
}

#[tokio::test]
async fn rate_limit_exhaustion_stops_mid_batch_with_partial_progress() {
    let activities: Vec<SourceActivity> = (0..10).map(|i| ride(&format!("S{i}"), i)).collect();
    let fifth_start = activities[4].start_time;

    let mut source = MockSource::new(Platform::Strava, activities);
    for i in 0..10 {
        source = source.with_download(&format!("S{i}"), b"FITBYTES");
    }
    let source = Arc::new(source);
    let target = Arc::new(MockTarget::new(Platform::Garmin));

    let harness = Harness::new(vec![source as Arc<dyn PlatformAdapter>, target.clone()]).await;

    // Budget for one listing call plus five downloads.
    settings::set(&harness.db, "rate_quarter_hour_limit_strava", "6")
        .await
        .unwrap();

    let report = sync_direction(
        &harness.ctx(&NullTranscoder),
        strava_to_garmin(),
        &SyncOptions::default(),
        None,
    )
    .await
    .unwrap();

    assert!(matches!(report.end, DirectionEnd::RateLimited { .. }));
    assert_eq!(report.counts.synced, 5);
    assert_eq!(target.uploads().len(), 5);

    // Cursor points at the last committed activity, so the next run picks
    // up the tail.
    assert_eq!(
        settings::last_cursor(&harness.db, Platform::Strava)
            .await
            .unwrap(),
        Some(fifth_start)
    );
}

#[tokio::test]
async fn onedrive_direction_transcodes_fit_to_gpx() {
    let activity = ride("S1", 0);

    let source = Arc::new(
        MockSource::new(Platform::Strava, vec![activity]).with_download("S1", b"FITBYTES"),
    );
    let target = Arc::new(MockTarget::new(Platform::Onedrive).preferring(FileFormat::Gpx));

    let harness = Harness::new(vec![source as Arc<dyn PlatformAdapter>, target.clone()]).await;
    let report = sync_direction(
        &harness.ctx(&FakeTranscoder),
        Direction::new(Platform::Strava, Platform::Onedrive),
        &SyncOptions::default(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.counts.synced, 1);
    let uploads = target.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(
        uploads[0],
        (FileFormat::Gpx, b"<gpx>converted</gpx>".to_vec())
    );
}

#[tokio::test]
async fn cancellation_commits_the_prefix_and_stops() {
    let activities: Vec<SourceActivity> = (0..6).map(|i| ride(&format!("S{i}"), i)).collect();
    let third_start = activities[2].start_time;

    let mut source = MockSource::new(Platform::Strava, activities);
    for i in 0..6 {
        source = source.with_download(&format!("S{i}"), b"FITBYTES");
    }
    let source = Arc::new(source);

    let cancel = CancelFlag::new();
    let target = Arc::new(MockTarget::new(Platform::Garmin).cancelling_after(3, cancel.clone()));

    let harness = Harness::new(vec![source as Arc<dyn PlatformAdapter>, target.clone()]).await;
    let options = SyncOptions {
        cancel,
        ..SyncOptions::default()
    };

    let report = sync_direction(
        &harness.ctx(&NullTranscoder),
        strava_to_garmin(),
        &options,
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.end, DirectionEnd::Cancelled);
    assert_eq!(report.counts.synced, 3);
    assert_eq!(target.uploads().len(), 3);

    // Cursor equals the start time of the last terminal activity.
    assert_eq!(
        settings::last_cursor(&harness.db, Platform::Strava)
            .await
            .unwrap(),
        Some(third_start)
    );
}

#[tokio::test]
async fn transient_upload_errors_go_pending_then_failed_after_retries() {
    let activity = ride("S1", 0);
    let fp = fingerprint(&activity.facts());

    let source = Arc::new(
        MockSource::new(Platform::Strava, vec![activity]).with_download("S1", b"FITBYTES"),
    );
    let target = Arc::new(
        MockTarget::new(Platform::Garmin)
            .with_outcome(UploadOutcome::TransientError {
                message: "gateway timeout".to_string(),
            })
            .with_outcome(UploadOutcome::TransientError {
                message: "gateway timeout".to_string(),
            }),
    );

    let harness = Harness::new(vec![source as Arc<dyn PlatformAdapter>, target]).await;
    let ctx = harness.ctx(&NullTranscoder);
    let direction = strava_to_garmin();
    let options = SyncOptions {
        max_retries: Some(2),
        ..SyncOptions::default()
    };

    let first = sync_direction(&ctx, direction, &options, None).await.unwrap();
    assert_eq!(first.counts.pending, 1);
    let status = catalog::get_status(&harness.db, &fp, Platform::Strava, Platform::Garmin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, SyncState::Pending);
    assert_eq!(status.retries, 1);

    // Cursor froze on the pending tail, so the activity is re-enumerated.
    let second = sync_direction(&ctx, direction, &options, None).await.unwrap();
    assert_eq!(second.counts.failed, 1);
    let status = catalog::get_status(&harness.db, &fp, Platform::Strava, Platform::Garmin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, SyncState::Failed);
    assert_eq!(status.reason.as_deref(), Some("transport"));
}

#[tokio::test]
async fn zero_activities_advance_the_cursor_to_now() {
    let source = Arc::new(MockSource::new(Platform::Strava, Vec::new()));
    let target = Arc::new(MockTarget::new(Platform::Garmin));

    let harness = Harness::new(vec![source as Arc<dyn PlatformAdapter>, target]).await;
    let before = Utc::now();
    let report = sync_direction(
        &harness.ctx(&NullTranscoder),
        strava_to_garmin(),
        &SyncOptions::default(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.end, DirectionEnd::Completed);
    let cursor = settings::last_cursor(&harness.db, Platform::Strava)
        .await
        .unwrap()
        .expect("cursor should advance");
    assert!(cursor >= before);
}

#[tokio::test]
async fn missing_adapter_is_a_process_error() {
    let source = Arc::new(MockSource::new(Platform::Strava, Vec::new()));
    let harness = Harness::new(vec![source as Arc<dyn PlatformAdapter>]).await;

    let err = sync_direction(
        &harness.ctx(&NullTranscoder),
        strava_to_garmin(),
        &SyncOptions::default(),
        None,
    )
    .await
    .expect_err("garmin adapter is not registered");
    assert!(err.to_string().contains("garmin"));
}
