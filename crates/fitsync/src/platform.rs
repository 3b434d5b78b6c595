//! Platform-agnostic adapter boundary for fitness services.
//!
//! This module defines the `PlatformAdapter` trait that gives the sync
//! executor a uniform view of Strava, Garmin Connect, iGPSPORT, OneDrive,
//! and Intervals.icu.
//!
//! # Example
//!
//! ```ignore
//! use fitsync::platform::{PlatformAdapter, SourceActivity};
//!
//! async fn newest<A: PlatformAdapter>(adapter: &A) -> Option<SourceActivity> {
//!     let since = chrono::Utc::now() - chrono::Duration::days(30);
//!     let mut activities = adapter
//!         .list_activities(since, chrono::Utc::now(), 10)
//!         .await
//!         .ok()?;
//!     activities.sort_by_key(|a| a.start_time);
//!     activities.pop()
//! }
//! ```

mod errors;
mod rate_limit;
mod registry;
mod types;

pub use errors::{AdapterError, Result};
pub use rate_limit::{ApiRateLimiter, RateLimitedAdapter, default_rps_for_platform, pacing};
pub use registry::AdapterRegistry;
pub use types::{
    AdapterInfo, Health, PlatformAdapter, SourceActivity, UploadMetadata, UploadOutcome,
};
