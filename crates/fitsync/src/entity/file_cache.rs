//! FileCache entity - content-addressed activity media files on disk.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::file_format::FileFormat;

/// FileCache model - one row per `(fingerprint, format)` cached file.
///
/// Files are addressed by fingerprint, not by source platform, so a download
/// from any source populates the cache for every downstream direction.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_cache")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub fingerprint: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub file_format: FileFormat,

    pub file_path: String,
    pub file_size: i64,
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
