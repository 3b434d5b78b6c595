//! Sport-type normalization.
//!
//! Every platform has its own sport vocabulary ("Ride", "road_biking",
//! "VirtualRide", ...). Before fingerprinting or matching, names are folded
//! into the closed canonical set in [`Sport`]. The synonym table is data,
//! not code: the built-in table ships as a JSON asset and deployments can
//! load an extended table from disk without a rebuild.

use std::collections::HashMap;
use std::path::Path;

use crate::entity::sport::Sport;

/// Built-in synonym table, canonical sport -> platform spellings.
const BUILTIN_TABLE: &str = include_str!("../assets/sport_types.json");

/// Raw table shape as stored on disk.
type RawTable = HashMap<String, Vec<String>>;

/// Errors loading a synonym table.
#[derive(Debug, thiserror::Error)]
pub enum SportTableError {
    #[error("failed to read sport table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse sport table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("sport table key is not a canonical sport: {0}")]
    UnknownCanonical(String),
}

/// Folds platform sport names into the canonical vocabulary.
#[derive(Debug, Clone)]
pub struct SportNormalizer {
    synonyms: HashMap<String, Sport>,
}

impl SportNormalizer {
    /// Build a normalizer from the built-in table.
    ///
    /// The embedded asset is validated at test time, so parsing it cannot
    /// fail in practice.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_TABLE).expect("embedded sport table is valid")
    }

    /// Load a table from a JSON file on disk, e.g. a user-extended copy of
    /// the built-in asset.
    pub fn from_path(path: &Path) -> Result<Self, SportTableError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn from_json(json: &str) -> Result<Self, SportTableError> {
        let raw: RawTable = serde_json::from_str(json)?;
        let mut synonyms = HashMap::new();

        for (canonical, spellings) in raw {
            let sport: Sport = canonical
                .parse()
                .map_err(|_| SportTableError::UnknownCanonical(canonical.clone()))?;
            for spelling in spellings {
                synonyms.insert(Self::fold_key(&spelling), sport);
            }
            // The canonical name always maps to itself.
            synonyms.insert(canonical, sport);
        }

        Ok(Self { synonyms })
    }

    /// Fold a platform spelling into lookup form: CamelCase becomes
    /// snake_case, separators become underscores, everything lowercased.
    /// Strava reports "VirtualRide" where Garmin says "virtual_ride".
    fn fold_key(name: &str) -> String {
        let mut key = String::with_capacity(name.len() + 4);
        let mut prev_lower = false;

        for c in name.trim().chars() {
            if c == ' ' || c == '-' {
                key.push('_');
                prev_lower = false;
            } else if c.is_uppercase() {
                if prev_lower {
                    key.push('_');
                }
                key.extend(c.to_lowercase());
                prev_lower = false;
            } else {
                key.push(c);
                prev_lower = c.is_lowercase() || c.is_ascii_digit();
            }
        }

        key
    }

    /// Normalize a platform sport name. Unknown inputs map to `Sport::Other`.
    #[must_use]
    pub fn normalize(&self, platform_name: &str) -> Sport {
        self.synonyms
            .get(&Self::fold_key(platform_name))
            .copied()
            .unwrap_or(Sport::Other)
    }

    /// Whether two platform names fold to the same canonical sport.
    ///
    /// `Other` never matches `Other`: two unknown vocabularies give no
    /// evidence the activities are the same kind.
    #[must_use]
    pub fn equivalent(&self, a: &str, b: &str) -> bool {
        let (a, b) = (self.normalize(a), self.normalize(b));
        a != Sport::Other && a == b
    }
}

impl Default for SportNormalizer {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_parses() {
        let normalizer = SportNormalizer::builtin();
        assert_eq!(normalizer.normalize("run"), Sport::Run);
    }

    #[test]
    fn synonyms_fold_to_canonical() {
        let n = SportNormalizer::builtin();
        assert_eq!(n.normalize("trail_run"), Sport::Run);
        assert_eq!(n.normalize("treadmill_running"), Sport::Run);
        assert_eq!(n.normalize("mountain_bike_ride"), Sport::Ride);
        assert_eq!(n.normalize("gravel_ride"), Sport::Ride);
        assert_eq!(n.normalize("zwift"), Sport::VirtualRide);
        assert_eq!(n.normalize("open_water_swimming"), Sport::Swim);
        assert_eq!(n.normalize("hiking"), Sport::Hike);
    }

    #[test]
    fn folding_is_case_and_separator_insensitive() {
        let n = SportNormalizer::builtin();
        assert_eq!(n.normalize("Trail Run"), Sport::Run);
        assert_eq!(n.normalize("TRAIL-RUN"), Sport::Run);
        assert_eq!(n.normalize("  ride  "), Sport::Ride);
    }

    #[test]
    fn camel_case_platform_names_fold_to_snake_case() {
        let n = SportNormalizer::builtin();
        assert_eq!(n.normalize("VirtualRide"), Sport::VirtualRide);
        assert_eq!(n.normalize("MountainBikeRide"), Sport::Ride);
        assert_eq!(n.normalize("Ride"), Sport::Ride);
        assert_eq!(n.normalize("TrailRun"), Sport::Run);
    }

    #[test]
    fn unknown_inputs_map_to_other() {
        let n = SportNormalizer::builtin();
        assert_eq!(n.normalize("kitesurfing"), Sport::Other);
        assert_eq!(n.normalize(""), Sport::Other);
    }

    #[test]
    fn equivalence_requires_a_known_sport() {
        let n = SportNormalizer::builtin();
        assert!(n.equivalent("ride", "cycling"));
        assert!(n.equivalent("run", "treadmill"));
        assert!(!n.equivalent("ride", "virtual_ride"));
        assert!(!n.equivalent("kitesurfing", "windsurfing"));
    }

    #[test]
    fn from_json_rejects_unknown_canonical_keys() {
        let err = SportNormalizer::from_json(r#"{"parkour": ["parkour"]}"#)
            .expect_err("unknown canonical key should fail");
        assert!(matches!(err, SportTableError::UnknownCanonical(_)));
    }
}
