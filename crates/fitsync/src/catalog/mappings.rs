use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};

use crate::entity::platform::Platform;
use crate::entity::platform_mapping::{ActiveModel, Column, Entity as PlatformMapping, Model};

use super::errors::{CatalogError, Result};

// ─── Platform Mappings ───────────────────────────────────────────────────────

/// Record that `platform` knows this activity as `activity_id`.
///
/// Unique upsert on `(fingerprint, platform)`: a re-observation overwrites
/// the stored id, so a given fingerprint has at most one mapping per
/// platform. The parent activity record must already exist.
pub async fn record_mapping<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    platform: Platform,
    activity_id: &str,
) -> Result<()> {
    let model = ActiveModel {
        fingerprint: Set(fingerprint.to_string()),
        platform: Set(platform),
        activity_id: Set(activity_id.to_string()),
        created_at: Set(Utc::now().fixed_offset()),
    };

    PlatformMapping::insert(model)
        .on_conflict(
            OnConflict::columns([Column::Fingerprint, Column::Platform])
                .update_columns([Column::ActivityId])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

/// Look up the platform-local id for an activity, if that platform has it.
pub async fn get_mapping<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    platform: Platform,
) -> Result<Option<Model>> {
    PlatformMapping::find_by_id((fingerprint.to_string(), platform))
        .one(db)
        .await
        .map_err(CatalogError::from)
}

/// Reverse lookup: which fingerprint does a platform-local id belong to?
pub async fn find_by_platform_id<C: ConnectionTrait>(
    db: &C,
    platform: Platform,
    activity_id: &str,
) -> Result<Option<Model>> {
    PlatformMapping::find()
        .filter(Column::Platform.eq(platform))
        .filter(Column::ActivityId.eq(activity_id))
        .one(db)
        .await
        .map_err(CatalogError::from)
}

/// All platforms known to hold this activity.
pub async fn mappings_for<C: ConnectionTrait>(db: &C, fingerprint: &str) -> Result<Vec<Model>> {
    PlatformMapping::find()
        .filter(Column::Fingerprint.eq(fingerprint))
        .all(db)
        .await
        .map_err(CatalogError::from)
}
