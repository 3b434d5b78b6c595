use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Summary activity as returned by `GET /api/v3/athlete/activities`.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Newer field; falls back to `type` for older payloads.
    #[serde(default)]
    pub sport_type: Option<String>,
    #[serde(rename = "type", default)]
    pub activity_type: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub elapsed_time: i64,
    #[serde(default)]
    pub total_elevation_gain: Option<f64>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub upload_id: Option<i64>,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl StravaActivity {
    /// The platform's sport name, preferring the newer `sport_type` field.
    #[must_use]
    pub fn sport_name(&self) -> &str {
        self.sport_type
            .as_deref()
            .or(self.activity_type.as_deref())
            .unwrap_or("")
    }
}

/// Response of `POST /oauth/token`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Response of `POST /api/v3/uploads` and `GET /api/v3/uploads/{id}`.
#[derive(Debug, Deserialize)]
pub struct UploadStatus {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub activity_id: Option<i64>,
}
