//! The reconciliation catalog: durable sync state.
//!
//! This module exposes the transactional interface over activity records,
//! platform mappings, per-direction sync statuses, cached files, API
//! counters, and key/value settings. All functions are free async functions
//! over any SeaORM connection, so callers can pass either a plain
//! `DatabaseConnection` or an open transaction when several writes must
//! commit together.

mod activities;
mod errors;
mod files;
mod limits;
mod mappings;
pub mod settings;
mod statistics;
mod status;

pub use activities::{find_candidates, get_activity, upsert_activity};
pub use errors::{CatalogError, Result};
pub use files::{
    all_cache, cache_for, get_cache, purge_cache_older_than, record_cache, remove_cache,
};
pub use limits::{get_api, put_api, reset_api_window};
pub use mappings::{find_by_platform_id, get_mapping, mappings_for, record_mapping};
pub use statistics::{DirectionCounts, Statistics, collect_statistics};
pub use status::{
    clear_status, get_status, increment_retry, list_pending, set_status, set_status_with_reason,
};
