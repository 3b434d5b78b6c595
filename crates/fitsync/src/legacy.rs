//! One-shot import of the legacy JSON state file.
//!
//! Earlier releases kept all sync state in a single `sync_database.json`.
//! On startup the driver offers that file to [`import_legacy_store`]; the
//! contents are folded into the catalog and the file is renamed to
//! `.backup` so the import never runs twice.
//!
//! Legacy fingerprints came from a different digest scheme, so records are
//! re-fingerprinted from their stored metadata. Rows whose metadata cannot
//! be parsed are skipped and counted rather than failing the import.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::ConnectionTrait;
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::{self, CatalogError, settings};
use crate::entity::file_format::FileFormat;
use crate::entity::platform::Platform;
use crate::entity::sync_state::SyncState;
use crate::fingerprint::{ActivityFacts, fingerprint};
use crate::sport::SportNormalizer;
use crate::sync::Direction;

/// Errors from the legacy import.
#[derive(Debug, Error)]
pub enum LegacyImportError {
    #[error("failed to read legacy store: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse legacy store: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// What the import brought over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyImportReport {
    pub activities: usize,
    pub mappings: usize,
    pub statuses: usize,
    pub cache_entries: usize,
    pub settings: usize,
    /// Rows dropped because their metadata or keys were unparsable.
    pub skipped: usize,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyStore {
    #[serde(default)]
    sync_records: HashMap<String, LegacyRecord>,
    #[serde(default)]
    sync_config: LegacyConfig,
}

#[derive(Debug, Deserialize)]
struct LegacyRecord {
    metadata: LegacyMetadata,
    #[serde(default)]
    platforms: HashMap<String, String>,
    #[serde(default)]
    files: HashMap<String, String>,
    #[serde(default)]
    sync_status: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LegacyMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    sport_type: String,
    start_time: String,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: i64,
    #[serde(default)]
    elevation_gain: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyConfig {
    #[serde(default)]
    last_sync: HashMap<String, String>,
    #[serde(default)]
    sync_rules: HashMap<String, bool>,
}

/// Import `path` into the catalog, renaming it to `<path>.backup` on
/// success. Returns `None` when no legacy file exists.
pub async fn import_legacy_store<C: ConnectionTrait>(
    db: &C,
    path: &Path,
) -> Result<Option<LegacyImportReport>, LegacyImportError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)?;
    let store: LegacyStore = serde_json::from_str(&contents)?;
    let normalizer = SportNormalizer::builtin();
    let mut report = LegacyImportReport::default();

    for record in store.sync_records.values() {
        let Some(start_time) = parse_legacy_instant(&record.metadata.start_time) else {
            report.skipped += 1;
            continue;
        };

        let facts = ActivityFacts {
            sport: normalizer.normalize(&record.metadata.sport_type),
            start_time,
            distance: record.metadata.distance,
            duration: record.metadata.duration,
        };
        let fp = fingerprint(&facts);

        catalog::upsert_activity(
            db,
            &fp,
            &record.metadata.name,
            &facts,
            record.metadata.elevation_gain,
        )
        .await?;
        report.activities += 1;

        for (platform, activity_id) in &record.platforms {
            let Ok(platform) = platform.parse::<Platform>() else {
                report.skipped += 1;
                continue;
            };
            catalog::record_mapping(db, &fp, platform, activity_id).await?;
            report.mappings += 1;
        }

        for (direction, status) in &record.sync_status {
            let (Ok(direction), Ok(status)) = (
                direction.parse::<Direction>(),
                parse_legacy_status(status),
            ) else {
                report.skipped += 1;
                continue;
            };
            catalog::set_status(db, &fp, direction.source, direction.target, status).await?;
            report.statuses += 1;
        }

        for (format, file_path) in &record.files {
            let Some(format) = FileFormat::from_extension(format) else {
                report.skipped += 1;
                continue;
            };
            let Ok(meta) = std::fs::metadata(file_path) else {
                // The file vanished since the legacy store was written.
                report.skipped += 1;
                continue;
            };
            catalog::record_cache(db, &fp, format, file_path, meta.len() as i64).await?;
            report.cache_entries += 1;
        }
    }

    for (platform, last_sync) in &store.sync_config.last_sync {
        let (Ok(platform), Some(at)) =
            (platform.parse::<Platform>(), parse_legacy_instant(last_sync))
        else {
            report.skipped += 1;
            continue;
        };
        settings::set_last_cursor(db, platform, at).await?;
        report.settings += 1;
    }

    for (direction, enabled) in &store.sync_config.sync_rules {
        let Ok(direction) = direction.parse::<Direction>() else {
            report.skipped += 1;
            continue;
        };
        settings::set_direction_rule(db, &direction, *enabled).await?;
        report.settings += 1;
    }

    let backup = path.with_extension("json.backup");
    std::fs::rename(path, &backup)?;
    tracing::info!(
        backup = %backup.display(),
        activities = report.activities,
        "Legacy store imported"
    );

    Ok(Some(report))
}

/// Legacy instants are Python `isoformat()` strings: RFC 3339 when a zone
/// was attached, naive local-less otherwise. Naive values are pinned to
/// UTC.
fn parse_legacy_instant(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_legacy_status(raw: &str) -> Result<SyncState, ()> {
    match raw {
        "pending" => Ok(SyncState::Pending),
        "synced" | "success" => Ok(SyncState::Synced),
        "skipped" => Ok(SyncState::Skipped),
        "failed" => Ok(SyncState::Failed),
        "duplicate" => Ok(SyncState::Duplicate),
        _ => Err(()),
    }
}
