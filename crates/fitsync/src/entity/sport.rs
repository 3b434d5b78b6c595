//! Canonical sport vocabulary.
//!
//! Platform-specific sport names are folded into this closed set before
//! fingerprinting or matching. The synonym table that performs the folding
//! lives in `crate::sport` as a data asset; this enum is only the target
//! vocabulary.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Canonical sport types.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    #[sea_orm(string_value = "ride")]
    Ride,
    #[sea_orm(string_value = "run")]
    Run,
    #[sea_orm(string_value = "swim")]
    Swim,
    #[sea_orm(string_value = "walk")]
    Walk,
    #[sea_orm(string_value = "hike")]
    Hike,
    #[sea_orm(string_value = "virtual_ride")]
    VirtualRide,
    /// Anything outside the closed vocabulary.
    #[sea_orm(string_value = "other")]
    Other,
}

impl Sport {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Sport::Ride => "ride",
            Sport::Run => "run",
            Sport::Swim => "swim",
            Sport::Walk => "walk",
            Sport::Hike => "hike",
            Sport::VirtualRide => "virtual_ride",
            Sport::Other => "other",
        }
    }
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ride" => Ok(Sport::Ride),
            "run" => Ok(Sport::Run),
            "swim" => Ok(Sport::Swim),
            "walk" => Ok(Sport::Walk),
            "hike" => Ok(Sport::Hike),
            "virtual_ride" => Ok(Sport::VirtualRide),
            "other" => Ok(Sport::Other),
            _ => Err(format!("Not a canonical sport: {}", s)),
        }
    }
}
