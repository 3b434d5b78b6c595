//! Query-time fuzzy equivalence between two activity records.
//!
//! The matcher is distinct from the fingerprint: the fingerprint is the
//! stored identity, while the matcher answers "could these two records be
//! the same real-world event?" when fingerprints disagree (a platform
//! reporting distance a few percent high lands in a different bucket).
//! The matcher never writes to the catalog; the executor decides what to do
//! with its verdict.

use crate::fingerprint::ActivityFacts;

/// Term weights. Time dominates: two activities starting together are far
/// stronger evidence than similar distances.
const TIME_WEIGHT: f64 = 0.40;
const SPORT_WEIGHT: f64 = 0.20;
const DISTANCE_WEIGHT: f64 = 0.20;
const DURATION_WEIGHT: f64 = 0.20;

/// Matching tolerances and verdict thresholds.
///
/// The defaults mirror the shipped tuning; deployments override them via
/// `matcher_*` rows in the sync_config table (see
/// [`crate::catalog::settings::matcher_thresholds`]).
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherThresholds {
    /// Scores strictly above this are a match.
    pub match_min: f64,
    /// Scores in `[ambiguous_min, match_min]` are ambiguous: logged but
    /// never auto-linked.
    pub ambiguous_min: f64,
    /// Start-time tolerance in seconds.
    pub time_tolerance_s: i64,
    /// Distance tolerance as a fraction of the average distance.
    pub distance_tolerance_pct: f64,
    /// Absolute distance tolerance floor in meters.
    pub distance_floor_m: f64,
    /// Duration tolerance as a fraction of the average duration.
    pub duration_tolerance_pct: f64,
    /// Absolute duration tolerance floor in seconds.
    pub duration_floor_s: f64,
}

impl Default for MatcherThresholds {
    fn default() -> Self {
        Self {
            match_min: 0.80,
            ambiguous_min: 0.60,
            time_tolerance_s: 5 * 60,
            distance_tolerance_pct: 0.05,
            distance_floor_m: 100.0,
            duration_tolerance_pct: 0.10,
            duration_floor_s: 30.0,
        }
    }
}

/// Outcome classification of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchVerdict {
    /// Confidently the same activity.
    Match,
    /// Suspicious similarity; surfaced to logs, never auto-linked.
    Ambiguous,
    /// Different activities.
    NoMatch,
}

/// A scored comparison of two activities.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchScore {
    /// Weighted total in `[0.0, 1.0]`.
    pub score: f64,
    pub verdict: MatchVerdict,
    pub time_term: f64,
    pub sport_term: f64,
    pub distance_term: f64,
    pub duration_term: f64,
}

/// Score two activities.
///
/// Each term grades linearly from 1.0 at zero delta down to 0.0 at the
/// tolerance edge (half-open: a delta of exactly the tolerance scores
/// zero). Sport is binary: equivalent under the normalization table or not.
#[must_use]
pub fn score(a: &ActivityFacts, b: &ActivityFacts, thresholds: &MatcherThresholds) -> MatchScore {
    let time_term = time_term(a, b, thresholds);
    let sport_term = if a.sport == b.sport && a.sport != crate::entity::sport::Sport::Other {
        1.0
    } else {
        0.0
    };
    let distance_term = proximity_term(
        a.distance,
        b.distance,
        thresholds.distance_tolerance_pct,
        thresholds.distance_floor_m,
    );
    let duration_term = proximity_term(
        a.duration as f64,
        b.duration as f64,
        thresholds.duration_tolerance_pct,
        thresholds.duration_floor_s,
    );

    let score = TIME_WEIGHT * time_term
        + SPORT_WEIGHT * sport_term
        + DISTANCE_WEIGHT * distance_term
        + DURATION_WEIGHT * duration_term;

    let verdict = if score > thresholds.match_min {
        MatchVerdict::Match
    } else if score >= thresholds.ambiguous_min {
        MatchVerdict::Ambiguous
    } else {
        MatchVerdict::NoMatch
    };

    MatchScore {
        score,
        verdict,
        time_term,
        sport_term,
        distance_term,
        duration_term,
    }
}

fn time_term(a: &ActivityFacts, b: &ActivityFacts, thresholds: &MatcherThresholds) -> f64 {
    let delta = (a.start_time - b.start_time).num_seconds().abs();
    let tolerance = thresholds.time_tolerance_s.max(1);
    (1.0 - delta as f64 / tolerance as f64).max(0.0)
}

/// Graded closeness of two magnitudes under a relative tolerance with an
/// absolute floor.
///
/// Zero readings get special handling: platforms report 0 for activities
/// they could not measure (indoor rides without a speed sensor), so a pair
/// of zeros is full agreement and a single zero is weak half-evidence.
fn proximity_term(a: f64, b: f64, tolerance_pct: f64, floor: f64) -> f64 {
    if a <= 0.0 && b <= 0.0 {
        return 1.0;
    }
    if a <= 0.0 || b <= 0.0 {
        return 0.5;
    }

    let diff = (a - b).abs();
    let tolerance = ((a + b) / 2.0 * tolerance_pct).max(floor);
    (1.0 - diff / tolerance).max(0.0)
}
