//! Content-addressed local store of activity media files.
//!
//! Files live at `cache_dir/<fingerprint>.<ext>` regardless of which
//! platform they came from, so one download serves every downstream
//! direction. The cache is advisory: rows whose file disappeared are
//! swept, and deleting the whole directory only costs re-downloads,
//! never catalog consistency.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use sea_orm::ConnectionTrait;
use thiserror::Error;

use crate::budget::{self, Admission};
use crate::catalog::{self, CatalogError};
use crate::entity::file_format::FileFormat;
use crate::entity::platform::Platform;
use crate::platform::{AdapterError, AdapterRegistry};
use crate::transcode::{TranscodeError, Transcoder};

/// Errors resolving or maintaining cached files.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No cached copy, no conversion path, and no mapped source could
    /// serve the file.
    #[error("no source available for {fingerprint} in {format}")]
    Unavailable {
        fingerprint: String,
        format: FileFormat,
    },
}

/// Result of a cache sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries removed because they aged past the TTL.
    pub expired: usize,
    /// Entries removed because the file vanished from disk.
    pub dangling: usize,
}

/// The on-disk half of the file cache. Row bookkeeping lives in
/// [`crate::catalog`].
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    cache_dir: PathBuf,
}

impl FileCacheStore {
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Create the cache directory if it does not exist.
    pub async fn init(&self) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        Ok(())
    }

    /// Canonical path for `(fingerprint, format)`.
    #[must_use]
    pub fn path_for(&self, fingerprint: &str, format: FileFormat) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", fingerprint, format.extension()))
    }

    /// Write `bytes` into the cache and register the catalog row.
    pub async fn store_bytes<C: ConnectionTrait>(
        &self,
        db: &C,
        fingerprint: &str,
        format: FileFormat,
        bytes: &[u8],
    ) -> Result<PathBuf, CacheError> {
        self.init().await?;
        let path = self.path_for(fingerprint, format);
        tokio::fs::write(&path, bytes).await?;
        catalog::record_cache(
            db,
            fingerprint,
            format,
            &path.to_string_lossy(),
            bytes.len() as i64,
        )
        .await?;
        Ok(path)
    }

    /// Resolve a file for `(fingerprint, required_format)`.
    ///
    /// Resolution order:
    /// 1. a cache hit in the required format,
    /// 2. a cached copy in another format the transcoder can convert,
    /// 3. a download from a mapped source platform (the direction's source
    ///    first), transcoding afterwards when the platform serves a
    ///    different format.
    ///
    /// Downloads are debited to the budget governor; a denial skips that
    /// source and surfaces as `AdapterError::RateLimited` only when no
    /// other source can serve the file.
    pub async fn ensure_file<C: ConnectionTrait>(
        &self,
        db: &C,
        registry: &AdapterRegistry,
        transcoder: &dyn Transcoder,
        fingerprint: &str,
        required: FileFormat,
        preferred_source: Option<Platform>,
    ) -> Result<PathBuf, CacheError> {
        // 1. Direct hit.
        if let Some(entry) = catalog::get_cache(db, fingerprint, required).await? {
            let path = PathBuf::from(&entry.file_path);
            if path.exists() {
                return Ok(path);
            }
            catalog::remove_cache(db, fingerprint, required).await?;
        }

        // 2. Convert a cached sibling format.
        for entry in catalog::cache_for(db, fingerprint).await? {
            let path = PathBuf::from(&entry.file_path);
            if !path.exists() || !transcoder.supports(entry.file_format, required) {
                continue;
            }
            let input = tokio::fs::read(&path).await?;
            let converted = transcoder
                .transcode(&input, entry.file_format, required)
                .await?;
            return self.store_bytes(db, fingerprint, required, &converted).await;
        }

        // 3. Download from a platform that holds the activity.
        let mut mappings = catalog::mappings_for(db, fingerprint).await?;
        if let Some(preferred) = preferred_source {
            mappings.sort_by_key(|m| m.platform != preferred);
        }

        let mut last_err: Option<CacheError> = None;
        for mapping in mappings {
            let Some(adapter) = registry.get(mapping.platform) else {
                continue;
            };

            match budget::reserve(db, mapping.platform, adapter.info().download_cost).await? {
                Admission::Granted => {}
                Admission::Denied { retry_after } => {
                    last_err = Some(CacheError::Adapter(AdapterError::RateLimited {
                        reset_at: Some(Utc::now() + retry_after),
                    }));
                    continue;
                }
            }

            let (bytes, actual) = match adapter.download(&mapping.activity_id, required).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::debug!(
                        platform = %mapping.platform,
                        fingerprint,
                        error = %err,
                        "Download failed, trying next source"
                    );
                    last_err = Some(CacheError::Adapter(err));
                    continue;
                }
            };

            let stored = self.store_bytes(db, fingerprint, actual, &bytes).await?;
            if actual == required {
                return Ok(stored);
            }

            if transcoder.supports(actual, required) {
                let converted = transcoder.transcode(&bytes, actual, required).await?;
                return self.store_bytes(db, fingerprint, required, &converted).await;
            }

            last_err = Some(CacheError::Unavailable {
                fingerprint: fingerprint.to_string(),
                format: required,
            });
        }

        Err(last_err.unwrap_or(CacheError::Unavailable {
            fingerprint: fingerprint.to_string(),
            format: required,
        }))
    }

    /// Remove entries older than `ttl` and entries whose file is gone.
    pub async fn sweep<C: ConnectionTrait>(
        &self,
        db: &C,
        ttl: Duration,
    ) -> Result<SweepReport, CacheError> {
        let mut report = SweepReport::default();

        for entry in catalog::purge_cache_older_than(db, Utc::now() - ttl).await? {
            let path = PathBuf::from(&entry.file_path);
            if path.exists() {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove cached file");
                }
            }
            report.expired += 1;
        }

        for entry in catalog::all_cache(db).await? {
            if !Path::new(&entry.file_path).exists() {
                catalog::remove_cache(db, &entry.fingerprint, entry.file_format).await?;
                report.dangling += 1;
            }
        }

        Ok(report)
    }
}

#[cfg(all(test, feature = "migrate"))]
mod tests {
    use super::*;
    use crate::db::connect_and_migrate;
    use crate::entity::sport::Sport;
    use crate::fingerprint::ActivityFacts;
    use crate::transcode::NullTranscoder;
    use chrono::TimeZone;
    use sea_orm::DatabaseConnection;

    async fn setup() -> (DatabaseConnection, FileCacheStore, tempfile::TempDir) {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        (db, store, dir)
    }

    async fn seed_activity(db: &DatabaseConnection, fingerprint: &str) {
        let facts = ActivityFacts {
            sport: Sport::Ride,
            start_time: Utc.with_ymd_and_hms(2025, 1, 10, 6, 0, 0).unwrap(),
            distance: 20000.0,
            duration: 3600,
        };
        catalog::upsert_activity(db, fingerprint, "Ride", &facts, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn store_then_ensure_hits_the_cache() {
        let (db, store, _dir) = setup().await;
        seed_activity(&db, "abc123").await;

        let stored = store
            .store_bytes(&db, "abc123", FileFormat::Fit, b"fit-bytes")
            .await
            .unwrap();

        let registry = AdapterRegistry::new();
        let resolved = store
            .ensure_file(&db, &registry, &NullTranscoder, "abc123", FileFormat::Fit, None)
            .await
            .unwrap();

        assert_eq!(stored, resolved);
        assert_eq!(tokio::fs::read(&resolved).await.unwrap(), b"fit-bytes");
    }

    #[tokio::test]
    async fn missing_file_behind_a_row_falls_through_to_unavailable() {
        let (db, store, _dir) = setup().await;
        seed_activity(&db, "abc123").await;

        store
            .store_bytes(&db, "abc123", FileFormat::Fit, b"fit-bytes")
            .await
            .unwrap();
        tokio::fs::remove_file(store.path_for("abc123", FileFormat::Fit))
            .await
            .unwrap();

        let registry = AdapterRegistry::new();
        let err = store
            .ensure_file(&db, &registry, &NullTranscoder, "abc123", FileFormat::Fit, None)
            .await
            .expect_err("no source should remain");
        assert!(matches!(err, CacheError::Unavailable { .. }));

        // The dangling row was dropped on the way through.
        assert!(catalog::get_cache(&db, "abc123", FileFormat::Fit)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn sweep_removes_expired_and_dangling_entries() {
        let (db, store, _dir) = setup().await;
        seed_activity(&db, "aaa").await;
        seed_activity(&db, "bbb").await;

        store
            .store_bytes(&db, "aaa", FileFormat::Fit, b"keep")
            .await
            .unwrap();
        store
            .store_bytes(&db, "bbb", FileFormat::Gpx, b"dangling")
            .await
            .unwrap();
        tokio::fs::remove_file(store.path_for("bbb", FileFormat::Gpx))
            .await
            .unwrap();

        let report = store.sweep(&db, Duration::days(30)).await.unwrap();
        assert_eq!(report.expired, 0);
        assert_eq!(report.dangling, 1);

        // TTL of zero expires everything that remains.
        let report = store.sweep(&db, Duration::zero()).await.unwrap();
        assert_eq!(report.expired, 1);
        assert!(!store.path_for("aaa", FileFormat::Fit).exists());
    }
}
