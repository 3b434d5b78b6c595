//! Progress reporting for sync runs.

use chrono::{DateTime, Duration, Utc};

use crate::entity::sync_state::SyncState;

use super::types::{Direction, SyncCounts};

/// Progress events emitted while a direction runs.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A direction started processing.
    DirectionStarted { direction: Direction },

    /// The enumeration window was selected.
    WindowSelected {
        direction: Direction,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        migration: bool,
    },

    /// The source listing returned.
    Listed { direction: Direction, count: usize },

    /// One activity is being processed.
    ProcessingActivity {
        /// Fingerprint of the activity.
        fingerprint: String,
        name: String,
        index: usize,
        total: usize,
    },

    /// One activity reached an outcome this run.
    ActivityOutcome {
        fingerprint: String,
        state: SyncState,
        reason: Option<String>,
    },

    /// The matcher found a near-identical catalog record it would not
    /// auto-link.
    AmbiguousMatch {
        fingerprint: String,
        candidate: String,
        score: f64,
    },

    /// The governor or platform stopped the direction.
    RateLimitStop {
        direction: Direction,
        retry_after: Duration,
    },

    /// The direction finished.
    DirectionFinished {
        direction: Direction,
        counts: SyncCounts,
    },

    /// Non-fatal warning worth surfacing.
    Warning { message: String },
}

/// Callback for progress events.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit an event if a callback is installed.
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(callback) = on_progress {
        callback(event);
    }
}
