//! ApiLimit entity - rolling API call counters per platform.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::platform::Platform;

/// ApiLimit model - one row per platform with budget counters.
///
/// `quarter_hour_*` tracks the 15-minute window, `daily_*` the 24-hour
/// window. The limits already include the safety margin (e.g. Strava's
/// daily cap of 200 is stored as 180). Expired windows are reset lazily by
/// the governor on the next reservation; there is no background timer.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_limits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub platform: Platform,

    #[sea_orm(default_value = 0)]
    pub daily_calls: i32,
    #[sea_orm(default_value = 0)]
    pub quarter_hour_calls: i32,
    pub daily_limit: i32,
    pub quarter_hour_limit: i32,
    /// When the 24-hour window rolls over.
    pub daily_reset_at: DateTimeWithTimeZone,
    /// When the 15-minute window rolls over.
    pub quarter_hour_reset_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
