//! Content-derived activity identity.
//!
//! Two platforms recording the same workout report slightly different
//! numbers: distance differs by GPS smoothing, duration by pause handling,
//! start time by device clock skew. The fingerprint canonicalizes the
//! metadata into coarse buckets before hashing so those copies collapse
//! onto one identity, while genuinely different activities in the same
//! minute keep distinct digests.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::entity::sport::Sport;

/// Number of hex characters kept from the digest. 64 bits is plenty for the
/// expected activity cardinality.
const DIGEST_LEN: usize = 16;

/// Distance bucket width in meters.
const DISTANCE_BUCKET_M: f64 = 100.0;

/// Duration bucket width in seconds.
const DURATION_BUCKET_S: i64 = 10;

/// The canonicalized inputs of an activity's identity.
///
/// Fields outside this set (name, elevation gain, description) never affect
/// the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityFacts {
    pub sport: Sport,
    pub start_time: DateTime<Utc>,
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub duration: i64,
}

impl From<&crate::entity::activity_record::Model> for ActivityFacts {
    fn from(record: &crate::entity::activity_record::Model) -> Self {
        Self {
            sport: record.sport_type,
            start_time: record.start_time.with_timezone(&Utc),
            distance: record.distance,
            duration: record.duration,
        }
    }
}

/// Compute the 16-hex-character fingerprint of an activity.
///
/// Canonicalization:
/// - sport is already normalized to the closed vocabulary
/// - start time is quantized to the UTC minute
/// - distance is floored to 100 m buckets
/// - duration is floored to 10 s buckets
///
/// The function is pure: identical canonicalized inputs always yield the
/// same digest, on any platform.
#[must_use]
pub fn fingerprint(facts: &ActivityFacts) -> String {
    let start_minute = facts.start_time.format("%Y-%m-%dT%H:%M");
    let distance_bucket = distance_bucket(facts.distance);
    let duration_bucket = duration_bucket(facts.duration);

    let canonical = format!(
        "{}|{}|{}|{}",
        facts.sport, start_minute, distance_bucket, duration_bucket
    );

    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(DIGEST_LEN);
    for byte in digest.iter().take(DIGEST_LEN / 2) {
        use std::fmt::Write;
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

fn distance_bucket(distance: f64) -> i64 {
    if !distance.is_finite() || distance <= 0.0 {
        return 0;
    }
    (distance / DISTANCE_BUCKET_M).floor() as i64 * DISTANCE_BUCKET_M as i64
}

fn duration_bucket(duration: i64) -> i64 {
    duration.max(0) / DURATION_BUCKET_S * DURATION_BUCKET_S
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn facts(sport: Sport, secs: u32, distance: f64, duration: i64) -> ActivityFacts {
        ActivityFacts {
            sport,
            start_time: Utc.with_ymd_and_hms(2025, 1, 10, 6, 0, secs).unwrap(),
            distance,
            duration,
        }
    }

    #[test]
    fn fingerprint_is_pure() {
        let a = facts(Sport::Ride, 0, 20034.0, 3612);
        assert_eq!(fingerprint(&a), fingerprint(&a));
    }

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let fp = fingerprint(&facts(Sport::Run, 0, 5000.0, 1800));
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sub_minute_clock_skew_is_tolerated() {
        let a = facts(Sport::Ride, 5, 20034.0, 3612);
        let b = facts(Sport::Ride, 55, 20034.0, 3612);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn distance_bucket_boundary_collapses() {
        // Both fall in the 5,000 m bucket.
        let a = facts(Sport::Run, 0, 5049.0, 1800);
        let b = facts(Sport::Run, 0, 5051.0, 1800);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn different_distance_buckets_diverge() {
        let a = facts(Sport::Run, 0, 5050.0, 1800);
        let b = facts(Sport::Run, 0, 5150.0, 1800);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn duration_rounds_to_ten_second_buckets() {
        let a = facts(Sport::Ride, 0, 20000.0, 3612);
        let b = facts(Sport::Ride, 0, 20000.0, 3618);
        let c = facts(Sport::Ride, 0, 20000.0, 3620);
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn sport_distinguishes_activities() {
        let a = facts(Sport::Ride, 0, 10000.0, 1800);
        let b = facts(Sport::VirtualRide, 0, 10000.0, 1800);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn negative_and_non_finite_distance_fall_into_zero_bucket() {
        let a = facts(Sport::Other, 0, -5.0, 0);
        let b = facts(Sport::Other, 0, f64::NAN, 0);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }
}
