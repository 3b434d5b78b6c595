use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur when talking to a fitness platform.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Credentials are missing, expired, or rejected. The driver surfaces
    /// this for reauthentication; the direction halts.
    #[error("Authentication required")]
    Unauthorized,

    /// The platform (or our own budget) refused the call.
    #[error("Rate limit exceeded")]
    RateLimited {
        /// When the platform says the limit resets, if it says.
        reset_at: Option<DateTime<Utc>>,
    },

    /// The activity was created in the platform's UI and has no original
    /// file to download.
    #[error("No original file for activity {activity_id}")]
    NoOriginalFile { activity_id: String },

    /// Resource does not exist on the platform.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Network failure or timeout. Retryable.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The platform answered with something we cannot use.
    #[error("API error: {message}")]
    Api { message: String },
}

impl AdapterError {
    #[inline]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn no_original_file(activity_id: impl Into<String>) -> Self {
        Self::NoOriginalFile {
            activity_id: activity_id.into(),
        }
    }

    /// Transient errors are retried (within a run by the adapter's backoff,
    /// across runs by the pending-status mechanism).
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
