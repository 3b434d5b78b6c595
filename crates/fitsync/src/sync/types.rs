//! Shared types for the directional sync executor.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Duration;

use crate::entity::platform::Platform;

/// Default number of activities processed per direction per invocation.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// First-sync lookback when no cursor exists.
pub const DEFAULT_INITIAL_WINDOW_DAYS: i64 = 30;

/// Cursor overlap guarding against late-arriving activities and clock skew.
pub const DEFAULT_OVERLAP_HOURS: i64 = 1;

/// An ordered `(source, target)` pair enabled for sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Direction {
    pub source: Platform,
    pub target: Platform,
}

impl Direction {
    pub fn new(source: Platform, target: Platform) -> Self {
        Self { source, target }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_to_{}", self.source, self.target)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, target) = s
            .split_once("_to_")
            .ok_or_else(|| format!("direction must be <source>_to_<target>, got {s:?}"))?;

        let source: Platform = source.parse()?;
        let target: Platform = target.parse()?;
        if source == target {
            return Err(format!("direction {s:?} has the same platform on both ends"));
        }

        Ok(Direction { source, target })
    }
}

/// Cooperative cancellation flag checked between activities and pages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Options for one executor invocation.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Max activities per direction per invocation.
    pub batch_size: usize,
    /// Lift the 30-day first-sync cap and walk the full history, tracked by
    /// a per-direction migration cursor.
    pub migration_mode: bool,
    /// Lookback for the very first sync of a platform.
    pub initial_window: Duration,
    /// Overlap subtracted from the cursor on incremental syncs.
    pub overlap: Duration,
    /// Transient-retry budget override; `None` reads the catalog tunable.
    pub max_retries: Option<i32>,
    pub cancel: CancelFlag,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            migration_mode: false,
            initial_window: Duration::days(DEFAULT_INITIAL_WINDOW_DAYS),
            overlap: Duration::hours(DEFAULT_OVERLAP_HOURS),
            max_retries: None,
            cancel: CancelFlag::new(),
        }
    }
}

/// Per-state outcome counts of one direction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub synced: usize,
    pub duplicate: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pending: usize,
}

impl SyncCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.synced + self.duplicate + self.skipped + self.failed + self.pending
    }
}

/// How a direction run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectionEnd {
    /// The batch ran to completion.
    Completed,
    /// The budget governor or the platform refused further calls; partial
    /// progress is committed and the cursor points at it.
    RateLimited { retry_after: Duration },
    /// Credentials failed; the driver should prompt reauth.
    Unauthorized,
    /// The cancellation flag was raised mid-batch.
    Cancelled,
    /// The direction could not proceed (listing failed, adapter missing
    /// capability). Other directions still run.
    Failed { message: String },
}

/// Result of one direction run.
#[derive(Debug, Clone)]
pub struct DirectionReport {
    pub direction: Direction,
    /// Activities enumerated from the source this run.
    pub listed: usize,
    /// Activities whose state changed this run.
    pub counts: SyncCounts,
    pub end: DirectionEnd,
    /// Non-fatal per-activity errors.
    pub errors: Vec<String>,
}

impl DirectionReport {
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            listed: 0,
            counts: SyncCounts::default(),
            end: DirectionEnd::Completed,
            errors: Vec::new(),
        }
    }
}
