use chrono::{DateTime, NaiveDateTime, Utc};

use crate::entity::file_format::FileFormat;
use crate::platform::{AdapterError, Result, SourceActivity};
use crate::sport::SportNormalizer;

use super::types::GarminActivity;

/// Convert a Garmin record to the platform-agnostic representation.
///
/// Garmin reports GMT timestamps without a zone suffix, so parsing is done
/// against the naive format and pinned to UTC.
pub fn to_source_activity(
    activity: &GarminActivity,
    normalizer: &SportNormalizer,
) -> Result<SourceActivity> {
    let start_time = parse_gmt(&activity.start_time_gmt)?;
    let sport_name = activity
        .activity_type
        .as_ref()
        .map(|t| t.type_key.as_str())
        .unwrap_or("");

    Ok(SourceActivity {
        platform_id: activity.activity_id.to_string(),
        name: activity
            .activity_name
            .clone()
            .unwrap_or_else(|| "Untitled".to_string()),
        sport: normalizer.normalize(sport_name),
        start_time,
        distance: activity.distance.unwrap_or(0.0),
        duration: activity.duration.unwrap_or(0.0).round() as i64,
        elevation_gain: activity.elevation_gain,
        manual: false,
        available_formats: vec![FileFormat::Fit],
    })
}

fn parse_gmt(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| AdapterError::api(format!("bad start time {raw:?}: {e}")))
}
