//! Directional sync executor.
//!
//! For each enabled `(source, target)` direction the engine enumerates new
//! source activities, resolves them against the catalog, fetches and
//! converts files through the cache, and drives uploads with replay-safe
//! semantics. Directions run one at a time; within a direction activities
//! are processed in ascending start-time order so the cursor can advance
//! safely after partial progress.

mod engine;
mod progress;
mod types;

pub use engine::{SyncContext, SyncError, sync_direction};
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use types::{
    CancelFlag, DEFAULT_BATCH_SIZE, DEFAULT_INITIAL_WINDOW_DAYS, DEFAULT_OVERLAP_HOURS, Direction,
    DirectionEnd, DirectionReport, SyncCounts, SyncOptions,
};
