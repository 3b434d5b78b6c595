//! Garmin Connect adapter.
//!
//! One implementation serves both regions: international
//! (`connectapi.garmin.com`) and China (`connectapi.garmin.cn`) differ only
//! in host and credentials, so the adapter is constructed per region and
//! registered under its own platform name.

mod client;
mod convert;
mod types;

pub use client::{GarminAdapter, GarminCredentials};
pub use convert::to_source_activity;
pub use types::GarminActivity;
