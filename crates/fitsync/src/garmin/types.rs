use serde::Deserialize;

/// Activity as returned by the activitylist-service search endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarminActivity {
    pub activity_id: i64,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub activity_type: Option<GarminActivityType>,
    /// `"2025-01-10 06:00:00"`, GMT.
    pub start_time_gmt: String,
    #[serde(default)]
    pub distance: Option<f64>,
    /// Seconds, fractional.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub elevation_gain: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarminActivityType {
    pub type_key: String,
}

/// Body of an SSO sign-in response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoTokenResponse {
    pub access_token: String,
}

/// Body of an upload-service response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(default)]
    pub detailed_import_result: Option<ImportResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    #[serde(default)]
    pub successes: Vec<ImportSuccess>,
    #[serde(default)]
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSuccess {
    #[serde(default)]
    pub internal_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    #[serde(default)]
    pub messages: Vec<ImportMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ImportMessage {
    #[serde(default)]
    pub content: Option<String>,
}
