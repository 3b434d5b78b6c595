//! iGPSPORT adapter.
//!
//! Cycling-computer platform: everything it records is a ride. Listing and
//! uploads go through the mobile web gateway with a bearer token obtained
//! from a username/password login; downloads fetch the FIT file from the
//! OSS URL the activity detail endpoint hands out.

mod client;

pub use client::{IgpsportAdapter, IgpsportCredentials};
