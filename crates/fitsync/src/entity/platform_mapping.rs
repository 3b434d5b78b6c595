//! PlatformMapping entity - fingerprint to platform-local activity id.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::platform::Platform;

/// PlatformMapping model - records which id a platform uses for an activity.
///
/// One row per `(fingerprint, platform)`. Rows are created when a platform's
/// copy of an activity is first observed and are never deleted; they answer
/// "does this platform already have it?" without issuing an upload.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "platform_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub fingerprint: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub platform: Platform,

    /// Platform-local activity identifier.
    pub activity_id: String,
    pub created_at: DateTimeWithTimeZone,
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
