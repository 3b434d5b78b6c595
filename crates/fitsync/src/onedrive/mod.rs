//! OneDrive adapter.
//!
//! A pure destination: activity files are dropped into a folder via the
//! Microsoft Graph API. GPX is preferred so Fog-of-World style tools can
//! read the traces straight out of the drive.

mod client;

pub use client::{OnedriveAdapter, OnedriveCredentials};
