//! Durable key/value settings: cursors, direction rules, and tunables.
//!
//! Tunables live in catalog rows rather than process globals so every run
//! (and every concurrent direction) reads the same values.

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, EntityTrait, Set, sea_query::OnConflict};

use crate::entity::platform::Platform;
use crate::entity::sync_config::{ActiveModel, Column, Entity as SyncConfig};
use crate::matcher::MatcherThresholds;
use crate::sync::Direction;

use super::errors::{CatalogError, Result};

/// Default cache time-to-live in days.
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 30;

/// Default transient-error retry budget per activity and direction.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Fetch a raw setting.
pub async fn get<C: ConnectionTrait>(db: &C, key: &str) -> Result<Option<String>> {
    let row = SyncConfig::find_by_id(key).one(db).await?;
    Ok(row.map(|r| r.value))
}

/// Store a raw setting, replacing any previous value.
pub async fn set<C: ConnectionTrait>(db: &C, key: &str, value: &str) -> Result<()> {
    let model = ActiveModel {
        key: Set(key.to_string()),
        value: Set(value.to_string()),
        updated_at: Set(Utc::now().fixed_offset()),
    };

    SyncConfig::insert(model)
        .on_conflict(
            OnConflict::column(Column::Key)
                .update_columns([Column::Value, Column::UpdatedAt])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

// ─── Cursors ─────────────────────────────────────────────────────────────────

fn cursor_key(platform: Platform) -> String {
    format!("last_sync_{platform}")
}

/// The most recent start_time up to which `platform` has been fully
/// enumerated, if any sync has completed.
pub async fn last_cursor<C: ConnectionTrait>(
    db: &C,
    platform: Platform,
) -> Result<Option<DateTime<Utc>>> {
    parse_instant(get(db, &cursor_key(platform)).await?)
}

/// Advance the incremental cursor for `platform`.
pub async fn set_last_cursor<C: ConnectionTrait>(
    db: &C,
    platform: Platform,
    cursor: DateTime<Utc>,
) -> Result<()> {
    set(db, &cursor_key(platform), &cursor.to_rfc3339()).await
}

fn migration_key(direction: &Direction) -> String {
    format!("migration_progress_{direction}")
}

/// Where the historical backfill for `direction` has reached, if started.
pub async fn migration_cursor<C: ConnectionTrait>(
    db: &C,
    direction: &Direction,
) -> Result<Option<DateTime<Utc>>> {
    parse_instant(get(db, &migration_key(direction)).await?)
}

/// Record backfill progress for `direction`.
pub async fn set_migration_cursor<C: ConnectionTrait>(
    db: &C,
    direction: &Direction,
    cursor: DateTime<Utc>,
) -> Result<()> {
    set(db, &migration_key(direction), &cursor.to_rfc3339()).await
}

fn parse_instant(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| CatalogError::corruption(format!("unparsable cursor {raw:?}: {e}"))),
    }
}

// ─── Direction Rules ─────────────────────────────────────────────────────────

fn rule_key(direction: &Direction) -> String {
    format!("sync_rule_{direction}")
}

/// Whether a direction is enabled. Directions with no stored rule default
/// to enabled.
pub async fn direction_enabled<C: ConnectionTrait>(db: &C, direction: &Direction) -> Result<bool> {
    Ok(get(db, &rule_key(direction)).await?.as_deref() != Some("false"))
}

/// Enable or disable a direction.
pub async fn set_direction_rule<C: ConnectionTrait>(
    db: &C,
    direction: &Direction,
    enabled: bool,
) -> Result<()> {
    set(db, &rule_key(direction), if enabled { "true" } else { "false" }).await
}

// ─── Tunables ────────────────────────────────────────────────────────────────

/// Matcher thresholds, with catalog overrides applied on top of defaults.
pub async fn matcher_thresholds<C: ConnectionTrait>(db: &C) -> Result<MatcherThresholds> {
    let mut thresholds = MatcherThresholds::default();

    if let Some(v) = get_f64(db, "matcher_match_threshold").await? {
        thresholds.match_min = v;
    }
    if let Some(v) = get_f64(db, "matcher_ambiguous_threshold").await? {
        thresholds.ambiguous_min = v;
    }
    if let Some(v) = get_f64(db, "matcher_time_tolerance_minutes").await? {
        thresholds.time_tolerance_s = (v * 60.0) as i64;
    }

    Ok(thresholds)
}

/// Cache TTL in days (default 30).
pub async fn cache_ttl_days<C: ConnectionTrait>(db: &C) -> Result<i64> {
    Ok(get_f64(db, "cache_ttl_days").await?.map_or(DEFAULT_CACHE_TTL_DAYS, |v| v as i64))
}

/// Transient-error retry budget (default 3).
pub async fn max_retries<C: ConnectionTrait>(db: &C) -> Result<i32> {
    Ok(get_f64(db, "max_retries").await?.map_or(DEFAULT_MAX_RETRIES, |v| v as i32))
}

async fn get_f64<C: ConnectionTrait>(db: &C, key: &str) -> Result<Option<f64>> {
    Ok(get(db, key).await?.and_then(|v| v.parse().ok()))
}
