//! OneDrive (Microsoft Graph) client and adapter implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::entity::file_format::FileFormat;
use crate::entity::platform::Platform;
use crate::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{
    AdapterError, AdapterInfo, Health, PlatformAdapter, Result, SourceActivity, UploadMetadata,
    UploadOutcome,
};

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Folder under the drive root where activities land.
const UPLOAD_FOLDER: &str = "Fitness";

/// User-supplied OneDrive credentials.
#[derive(Debug, Clone)]
pub struct OnedriveCredentials {
    pub client_id: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DriveItem {
    #[serde(default)]
    id: Option<String>,
}

/// OneDrive adapter over an [`HttpTransport`].
pub struct OnedriveAdapter<T> {
    transport: T,
    credentials: OnedriveCredentials,
    access_token: Mutex<Option<String>>,
}

impl<T: HttpTransport> OnedriveAdapter<T> {
    pub fn new(transport: T, credentials: OnedriveCredentials) -> Self {
        Self {
            transport,
            credentials,
            access_token: Mutex::new(None),
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.send(request).await.map_err(|e| match e {
            HttpError::Transport(message) => AdapterError::Transport { message },
            other => AdapterError::api(other.to_string()),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let form = format!(
            "client_id={}&refresh_token={}&grant_type=refresh_token&scope=Files.ReadWrite offline_access",
            self.credentials.client_id, self.credentials.refresh_token
        );
        let request = HttpRequest::post(TOKEN_URL, form.into_bytes())
            .header("Content-Type", "application/x-www-form-urlencoded");

        let response = self.send(request).await?;
        if response.status == 400 || response.status == 401 {
            return Err(AdapterError::Unauthorized);
        }
        if response.status != 200 {
            return Err(AdapterError::api(format!(
                "token refresh: unexpected status {}",
                response.status
            )));
        }

        let token: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad token response: {e}")))?;

        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}

/// Sanitize an activity name into a portable file name.
fn file_name_for(metadata: &UploadMetadata, format: FileFormat) -> String {
    let safe: String = metadata
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!(
        "{}_{}.{}",
        metadata.start_time.format("%Y%m%dT%H%M%SZ"),
        safe.trim_matches('_'),
        format.extension()
    )
}

#[async_trait]
impl<T: HttpTransport> PlatformAdapter for OnedriveAdapter<T> {
    fn platform(&self) -> Platform {
        Platform::Onedrive
    }

    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            platform: Platform::Onedrive,
            list_cost: 1,
            download_cost: 1,
            upload_cost: 1,
        }
    }

    fn supported_upload_formats(&self) -> Vec<FileFormat> {
        // A drive stores anything; the preference below steers transcoding.
        vec![FileFormat::Gpx, FileFormat::Fit, FileFormat::Tcx]
    }

    fn preferred_upload_format(&self) -> Option<FileFormat> {
        Some(FileFormat::Gpx)
    }

    async fn list_activities(
        &self,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<SourceActivity>> {
        Err(AdapterError::api("onedrive is a destination only"))
    }

    async fn download(
        &self,
        _platform_id: &str,
        _preferred: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat)> {
        Err(AdapterError::api("onedrive is a destination only"))
    }

    async fn upload(
        &self,
        bytes: &[u8],
        format: FileFormat,
        metadata: &UploadMetadata,
    ) -> Result<UploadOutcome> {
        let token = self.access_token().await?;
        let file_name = file_name_for(metadata, format);
        let url = format!(
            "{GRAPH_BASE}/me/drive/root:/{UPLOAD_FOLDER}/{file_name}:/content"
        );

        let request = HttpRequest {
            method: HttpMethod::Put,
            url,
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {token}")),
                (
                    "Content-Type".to_string(),
                    "application/octet-stream".to_string(),
                ),
            ],
            body: bytes.to_vec(),
        };

        let response = self.send(request).await?;
        match response.status {
            200 | 201 => {
                let item: DriveItem = serde_json::from_slice(&response.body)
                    .unwrap_or(DriveItem { id: None });
                Ok(UploadOutcome::Accepted {
                    remote_id: item.id.unwrap_or_else(|| file_name.clone()),
                })
            }
            401 | 403 => Err(AdapterError::Unauthorized),
            409 => Ok(UploadOutcome::Duplicate),
            429 => Err(AdapterError::RateLimited { reset_at: None }),
            s if s >= 500 => Ok(UploadOutcome::TransientError {
                message: format!("upload returned {s}"),
            }),
            s => Ok(UploadOutcome::Rejected {
                reason: format!("graph returned {s}"),
            }),
        }
    }

    async fn health_check(&self) -> Health {
        match self.send(HttpRequest::get(GRAPH_BASE)).await {
            Ok(resp) if resp.status < 500 => Health::Ok,
            Ok(_) => Health::Degraded,
            Err(_) => Health::Down,
        }
    }
}
