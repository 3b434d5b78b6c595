//! SyncConfig entity - durable key/value tunables and cursors.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SyncConfig model - one row per setting.
///
/// Holds per-platform cursors (`last_sync_<platform>`), direction rules
/// (`sync_rule_<src>_to_<dst>`), migration progress markers, and tunables
/// such as matcher thresholds and cache TTL. Settings live here rather than
/// in process globals so every run sees the same values.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: String,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
