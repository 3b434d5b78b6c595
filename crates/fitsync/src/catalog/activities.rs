use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entity::activity_record::{ActiveModel, Column, Entity as ActivityRecord, Model};
use crate::entity::sport::Sport;
use crate::fingerprint::ActivityFacts;

use super::errors::{CatalogError, Result};

// ─── Activity Records ────────────────────────────────────────────────────────

/// Insert or update the logical activity row for `fingerprint`.
///
/// On re-observation the metadata is refreshed with the latest values while
/// `created_at` is preserved; calling twice with identical input leaves the
/// row unchanged. The fingerprint must be the digest of `facts` - the
/// catalog stores what it is given and does not recompute.
pub async fn upsert_activity<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    name: &str,
    facts: &ActivityFacts,
    elevation_gain: Option<f64>,
) -> Result<Model> {
    if fingerprint.is_empty() {
        return Err(CatalogError::invalid_input("empty fingerprint"));
    }

    let now = Utc::now().fixed_offset();
    let existing = ActivityRecord::find_by_id(fingerprint).one(db).await?;

    match existing {
        Some(existing) => {
            let mut update: ActiveModel = existing.into();
            update.name = Set(name.to_string());
            update.sport_type = Set(facts.sport);
            update.start_time = Set(facts.start_time.fixed_offset());
            update.distance = Set(facts.distance);
            update.duration = Set(facts.duration);
            update.elevation_gain = Set(elevation_gain);
            update.updated_at = Set(now);
            update.update(db).await.map_err(CatalogError::from)
        }
        None => {
            let insert = ActiveModel {
                fingerprint: Set(fingerprint.to_string()),
                name: Set(name.to_string()),
                sport_type: Set(facts.sport),
                start_time: Set(facts.start_time.fixed_offset()),
                distance: Set(facts.distance),
                duration: Set(facts.duration),
                elevation_gain: Set(elevation_gain),
                created_at: Set(now),
                updated_at: Set(now),
            };
            insert.insert(db).await.map_err(CatalogError::from)
        }
    }
}

/// Fetch an activity record by fingerprint.
pub async fn get_activity<C: ConnectionTrait>(db: &C, fingerprint: &str) -> Result<Option<Model>> {
    ActivityRecord::find_by_id(fingerprint)
        .one(db)
        .await
        .map_err(CatalogError::from)
}

/// Find records of the same sport whose start time falls within
/// `start ± window`. Used by the executor's matcher-based duplicate pass.
pub async fn find_candidates<C: ConnectionTrait>(
    db: &C,
    sport: Sport,
    start: DateTime<Utc>,
    window: Duration,
) -> Result<Vec<Model>> {
    let lower = (start - window).fixed_offset();
    let upper = (start + window).fixed_offset();

    ActivityRecord::find()
        .filter(Column::SportType.eq(sport))
        .filter(Column::StartTime.gte(lower))
        .filter(Column::StartTime.lte(upper))
        .order_by_asc(Column::StartTime)
        .all(db)
        .await
        .map_err(CatalogError::from)
}
