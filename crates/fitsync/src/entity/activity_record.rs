//! ActivityRecord entity - the logical activity, keyed by fingerprint.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::sport::Sport;

/// ActivityRecord model - one row per logical activity across all platforms.
///
/// The fingerprint is content-derived (sport, start minute, distance and
/// duration buckets) so independently-recorded copies of the same workout
/// collapse onto one row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_records")]
pub struct Model {
    /// 16-hex-character content-derived identity.
    #[sea_orm(primary_key, auto_increment = false)]
    pub fingerprint: String,

    /// Display name as last observed on any platform.
    pub name: String,
    /// Canonical sport type.
    pub sport_type: Sport,
    /// Start instant, UTC.
    pub start_time: DateTimeWithTimeZone,
    /// Distance in meters.
    pub distance: f64,
    /// Moving/elapsed duration in seconds.
    pub duration: i64,
    /// Elevation gain in meters, when a platform reports it.
    pub elevation_gain: Option<f64>,

    /// When this record was first observed.
    pub created_at: DateTimeWithTimeZone,
    /// When this record was last re-observed and refreshed.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::platform_mapping::Entity")]
    PlatformMapping,
    #[sea_orm(has_many = "super::sync_status::Entity")]
    SyncStatus,
    #[sea_orm(has_many = "super::file_cache::Entity")]
    FileCache,
}

impl Related<super::platform_mapping::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlatformMapping.def()
    }
}

impl Related<super::sync_status::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncStatus.def()
    }
}

impl Related<super::file_cache::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileCache.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
