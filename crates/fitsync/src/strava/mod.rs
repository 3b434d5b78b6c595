//! Strava adapter.
//!
//! Listing and uploads go through the v3 REST API with an OAuth refresh
//! token. Original-file downloads are not exposed by the API at all, so
//! they ride the web session cookie against the `export_original`
//! endpoint, the same path the browser uses.

mod client;
mod convert;
mod types;

pub use client::{StravaAdapter, StravaCredentials};
pub use convert::{is_manual_activity, to_source_activity};
pub use types::StravaActivity;
