use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::entity::file_format::FileFormat;
use crate::entity::platform::Platform;

use super::errors::Result;
use super::types::{
    AdapterInfo, Health, PlatformAdapter, SourceActivity, UploadMetadata, UploadOutcome,
};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request pacing per platform (requests per second).
///
/// Pacing is orthogonal to the windowed budget in [`crate::budget`]: the
/// budget bounds how many calls a run may make, pacing spreads them out so
/// bursts don't trip secondary throttles.
pub mod pacing {
    /// Strava tolerates short bursts; keep well under the 100/15 min cap.
    pub const STRAVA_DEFAULT_RPS: u32 = 2;
    /// Garmin Connect has no published quota; be conservative.
    pub const GARMIN_DEFAULT_RPS: u32 = 1;
    /// Smaller platforms get the conservative default.
    pub const DEFAULT_RPS: u32 = 1;
}

/// Get the default pacing rate for a platform.
#[must_use]
pub fn default_rps_for_platform(platform: Platform) -> u32 {
    match platform {
        Platform::Strava => pacing::STRAVA_DEFAULT_RPS,
        Platform::Garmin | Platform::GarminCn => pacing::GARMIN_DEFAULT_RPS,
        _ => pacing::DEFAULT_RPS,
    }
}

/// A standalone request pacer using the governor crate.
///
/// # Example
///
/// ```ignore
/// use fitsync::platform::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::new(2); // 2 requests per second
///
/// limiter.wait().await;
/// client.some_api_call().await?;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a limiter allowing `requests_per_second` (0 is clamped to 1).
    #[must_use]
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(1).unwrap());
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner: Arc::new(rate_limiter),
        }
    }

    /// Wait (asynchronously) until another request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

/// A pacing wrapper around any `PlatformAdapter`.
///
/// All network-bound trait methods wait for the limiter before delegating
/// to the inner adapter.
pub struct RateLimitedAdapter<A> {
    inner: A,
    rate_limiter: Arc<GovernorRateLimiter>,
}

impl<A> RateLimitedAdapter<A> {
    /// Wrap `inner`, limiting it to `requests_per_second`.
    pub fn new(inner: A, requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(1).unwrap());
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner,
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    /// Get a reference to the inner adapter.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    async fn wait(&self) {
        self.rate_limiter.until_ready().await;
    }
}

impl<A: Clone> Clone for RateLimitedAdapter<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
        }
    }
}

#[async_trait]
impl<A: PlatformAdapter> PlatformAdapter for RateLimitedAdapter<A> {
    fn platform(&self) -> Platform {
        self.inner.platform()
    }

    fn info(&self) -> AdapterInfo {
        self.inner.info()
    }

    fn supported_upload_formats(&self) -> Vec<FileFormat> {
        self.inner.supported_upload_formats()
    }

    fn preferred_upload_format(&self) -> Option<FileFormat> {
        self.inner.preferred_upload_format()
    }

    async fn list_activities(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceActivity>> {
        self.wait().await;
        self.inner.list_activities(since, until, limit).await
    }

    async fn download(
        &self,
        platform_id: &str,
        preferred: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat)> {
        self.wait().await;
        self.inner.download(platform_id, preferred).await
    }

    async fn upload(
        &self,
        bytes: &[u8],
        format: FileFormat,
        metadata: &UploadMetadata,
    ) -> Result<UploadOutcome> {
        self.wait().await;
        self.inner.upload(bytes, format, metadata).await
    }

    async fn health_check(&self) -> Health {
        self.wait().await;
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration as StdDuration, Instant};

    #[test]
    fn test_default_rps() {
        assert_eq!(default_rps_for_platform(Platform::Strava), 2);
        assert_eq!(default_rps_for_platform(Platform::Garmin), 1);
        assert_eq!(default_rps_for_platform(Platform::Onedrive), 1);
    }

    #[test]
    fn test_api_rate_limiter_new_clamps_zero() {
        let limiter = ApiRateLimiter::new(0);
        let _cloned = limiter.clone();
    }

    #[tokio::test]
    async fn test_api_rate_limiter_allows_first_request_immediately() {
        let limiter = ApiRateLimiter::new(100);
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < StdDuration::from_millis(50));
    }
}
