use crate::entity::file_format::FileFormat;
use crate::platform::SourceActivity;
use crate::sport::SportNormalizer;

use super::types::StravaActivity;

/// Classify a Strava record as manually created.
///
/// A manual activity has no original file to download. Strava does not flag
/// this directly, but a device upload always carries a device name, an
/// upload id, and an external id; a record with all three absent was typed
/// into the UI.
#[must_use]
pub fn is_manual_activity(activity: &StravaActivity) -> bool {
    let has_device = activity
        .device_name
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty());
    let has_upload_id = activity.upload_id.is_some();
    let has_external_id = activity
        .external_id
        .as_deref()
        .is_some_and(|e| !e.trim().is_empty());

    !has_device && !has_upload_id && !has_external_id
}

/// Convert a Strava record to the platform-agnostic representation.
#[must_use]
pub fn to_source_activity(
    activity: &StravaActivity,
    normalizer: &SportNormalizer,
) -> SourceActivity {
    let manual = is_manual_activity(activity);

    SourceActivity {
        platform_id: activity.id.to_string(),
        name: activity.name.clone(),
        sport: normalizer.normalize(activity.sport_name()),
        start_time: activity.start_date,
        distance: activity.distance,
        duration: activity.elapsed_time,
        elevation_gain: activity.total_elevation_gain,
        manual,
        // export_original serves whatever the device uploaded, which for
        // practical purposes is FIT.
        available_formats: if manual { vec![] } else { vec![FileFormat::Fit] },
    }
}
