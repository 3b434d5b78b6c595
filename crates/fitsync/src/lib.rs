//! FitSync - a multi-platform athletic-activity synchronization engine.
//!
//! This library reconciles the activity catalogs of heterogeneous fitness
//! platforms (Strava, Garmin Connect, iGPSPORT, OneDrive, Intervals.icu) so
//! a workout recorded on any participating platform appears on every
//! configured destination exactly once, in an appropriate file format.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support. When enabled, use
//!   [`connect_and_migrate`] to bring the catalog schema up to date on open.
//! - `strava` / `garmin` / `igpsport` / `onedrive` / `intervals_icu` -
//!   Enable the corresponding platform adapter.
//!
//! # Example
//!
//! ```ignore
//! use fitsync::{connect_and_migrate, sync::{Direction, SyncOptions, sync_direction}};
//!
//! let db = connect_and_migrate("sqlite://sync_database.db?mode=rwc").await?;
//!
//! let direction: Direction = "strava_to_garmin".parse()?;
//! let report = sync_direction(&db, &registry, &cache, &direction, &options, None).await?;
//! println!("{} synced, {} skipped", report.counts.synced, report.counts.skipped);
//! ```

pub mod budget;
pub mod cache;
pub mod catalog;
pub mod db;
pub mod entity;
pub mod fingerprint;
pub mod legacy;
pub mod matcher;
pub mod platform;
pub mod sport;
pub mod sync;
pub mod transcode;

pub mod http;

#[cfg(any(
    feature = "strava",
    feature = "garmin",
    feature = "igpsport",
    feature = "onedrive",
    feature = "intervals_icu"
))]
pub mod retry;

#[cfg(feature = "strava")]
pub mod strava;

#[cfg(feature = "garmin")]
pub mod garmin;

#[cfg(feature = "igpsport")]
pub mod igpsport;

#[cfg(feature = "onedrive")]
pub mod onedrive;

#[cfg(feature = "intervals_icu")]
pub mod intervals_icu;

#[cfg(feature = "migrate")]
pub mod migration;

pub use budget::{Admission, reserve};
pub use catalog::CatalogError;
pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use fingerprint::fingerprint;
pub use platform::{
    AdapterError, AdapterInfo, AdapterRegistry, Health, PlatformAdapter, RateLimitedAdapter,
    SourceActivity, UploadOutcome,
};
pub use sync::{Direction, SyncOptions, SyncProgress};
