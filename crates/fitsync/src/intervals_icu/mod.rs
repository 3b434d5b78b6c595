//! Intervals.icu adapter.
//!
//! A pure destination: activity files are posted to the athlete's account
//! with API-key basic auth. Intervals runs its own dedup, which surfaces
//! here as an explicit duplicate outcome.

mod client;

pub use client::{IntervalsIcuAdapter, IntervalsIcuCredentials};
