use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::file_format::FileFormat;
use crate::entity::platform::Platform;
use crate::entity::sport::Sport;
use crate::fingerprint::ActivityFacts;

use super::errors::Result;

/// An activity as enumerated from a source platform.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceActivity {
    /// Platform-local identifier.
    pub platform_id: String,
    /// Display name.
    pub name: String,
    /// Canonical sport (the adapter normalizes before returning).
    pub sport: Sport,
    /// Start instant, UTC.
    pub start_time: DateTime<Utc>,
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub duration: i64,
    /// Meters, when reported.
    pub elevation_gain: Option<f64>,
    /// Created in the platform UI without a device file; nothing to
    /// download.
    pub manual: bool,
    /// Formats the platform can serve for this activity.
    pub available_formats: Vec<FileFormat>,
}

impl SourceActivity {
    /// The canonicalized identity inputs of this activity.
    #[must_use]
    pub fn facts(&self) -> ActivityFacts {
        ActivityFacts {
            sport: self.sport,
            start_time: self.start_time,
            distance: self.distance,
            duration: self.duration,
        }
    }
}

/// Result of an upload attempt. `Duplicate` is a success, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Accepted; the destination assigned this id.
    Accepted { remote_id: String },
    /// The destination already holds this activity.
    Duplicate,
    /// Permanently refused (bad file, unsupported sport, ...). Not retried.
    Rejected { reason: String },
    /// Temporary failure; retried on a later run.
    TransientError { message: String },
}

/// Metadata attached to an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadMetadata {
    pub name: String,
    pub sport: Sport,
    pub start_time: DateTime<Utc>,
}

/// Static description of an adapter, fed to the budget governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterInfo {
    pub platform: Platform,
    /// Budget cost of one list page.
    pub list_cost: i32,
    /// Budget cost of one file download.
    pub download_cost: i32,
    /// Budget cost of one upload.
    pub upload_cost: i32,
}

/// Coarse adapter health probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    Degraded,
    Down,
}

/// Trait for fitness platform adapters.
///
/// This is the sole polymorphic boundary of the engine: the executor only
/// ever sees this interface, so adding a platform touches the registry and
/// nothing else.
///
/// # Implementation notes
///
/// Implementors should:
/// - Normalize sport names before returning `SourceActivity` values
/// - Handle authentication internally; every call either succeeds on its
///   own credentials or fails with `AdapterError::Unauthorized`
/// - Convert platform errors to `AdapterError`, classifying manually
///   created activities as `NoOriginalFile` on download
/// - Destination-only platforms return `AdapterError::Api` from
///   `list_activities` and `download`
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Which platform this adapter talks to.
    fn platform(&self) -> Platform;

    /// Costs for the budget governor.
    fn info(&self) -> AdapterInfo;

    /// Formats this platform accepts for upload.
    fn supported_upload_formats(&self) -> Vec<FileFormat>;

    /// A destination-specific format preference overriding the default
    /// FIT > TCX > GPX order (OneDrive wants GPX for Fog-of-World use).
    fn preferred_upload_format(&self) -> Option<FileFormat> {
        None
    }

    /// List activities started in `[since, until]`, at most `limit`.
    /// Ordering is unspecified; the executor sorts.
    async fn list_activities(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceActivity>>;

    /// Download the original file for an activity.
    ///
    /// The platform may serve a different format than preferred; the actual
    /// format is returned with the bytes.
    async fn download(
        &self,
        platform_id: &str,
        preferred: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat)>;

    /// Upload an activity file.
    async fn upload(
        &self,
        bytes: &[u8],
        format: FileFormat,
        metadata: &UploadMetadata,
    ) -> Result<UploadOutcome>;

    /// Probe platform reachability.
    async fn health_check(&self) -> Health;
}
