//! SyncStatus entity - per-direction transfer state of one activity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::platform::Platform;
use crate::entity::sync_state::SyncState;

/// SyncStatus model - one row per `(fingerprint, source, target)` triple.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_status")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub fingerprint: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_platform: Platform,
    #[sea_orm(primary_key, auto_increment = false)]
    pub target_platform: Platform,

    pub status: SyncState,
    /// Why a terminal state was reached (`no_source_file`, `not_found`,
    /// `transport`, upload rejection text, ...).
    pub reason: Option<String>,
    /// Transient-error retries consumed so far.
    #[sea_orm(default_value = 0)]
    pub retries: i32,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activity_record::Entity",
        from = "Column::Fingerprint",
        to = "super::activity_record::Column::Fingerprint"
    )]
    ActivityRecord,
}

impl Related<super::activity_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
