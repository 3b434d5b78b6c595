//! Platform enum for type-safe handling of the fitness services we sync.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Supported fitness platforms.
///
/// `GarminCn` is Garmin Connect's China-region deployment. It shares the
/// Garmin adapter implementation but has its own credentials, host, and
/// catalog identity, so activities can flow between the two regions.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Strava (strava.com)
    #[sea_orm(string_value = "strava")]
    Strava,
    /// Garmin Connect, international region
    #[sea_orm(string_value = "garmin")]
    Garmin,
    /// Garmin Connect, China region
    #[sea_orm(string_value = "garmin_cn")]
    GarminCn,
    /// iGPSPORT cycling computers
    #[sea_orm(string_value = "igpsport")]
    Igpsport,
    /// OneDrive (file drop destination)
    #[sea_orm(string_value = "onedrive")]
    Onedrive,
    /// Intervals.icu training analytics
    #[sea_orm(string_value = "intervals_icu")]
    IntervalsIcu,
}

impl Platform {
    /// All platform variants, in registry order.
    pub const ALL: [Platform; 6] = [
        Platform::Strava,
        Platform::Garmin,
        Platform::GarminCn,
        Platform::Igpsport,
        Platform::Onedrive,
        Platform::IntervalsIcu,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Strava => "strava",
            Platform::Garmin => "garmin",
            Platform::GarminCn => "garmin_cn",
            Platform::Igpsport => "igpsport",
            Platform::Onedrive => "onedrive",
            Platform::IntervalsIcu => "intervals_icu",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strava" => Ok(Platform::Strava),
            "garmin" => Ok(Platform::Garmin),
            "garmin_cn" => Ok(Platform::GarminCn),
            "igpsport" => Ok(Platform::Igpsport),
            "onedrive" => Ok(Platform::Onedrive),
            "intervals_icu" | "intervals.icu" => Ok(Platform::IntervalsIcu),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_from_str() {
        for platform in Platform::ALL {
            assert_eq!(
                platform.to_string().parse::<Platform>().unwrap(),
                platform
            );
        }
    }

    #[test]
    fn test_from_str_accepts_dotted_intervals_alias() {
        assert_eq!(
            "intervals.icu".parse::<Platform>().unwrap(),
            Platform::IntervalsIcu
        );
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("fitbit".parse::<Platform>().is_err());
    }
}
