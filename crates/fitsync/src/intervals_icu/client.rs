//! Intervals.icu API client and adapter implementation.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::entity::file_format::FileFormat;
use crate::entity::platform::Platform;
use crate::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{
    AdapterError, AdapterInfo, Health, PlatformAdapter, Result, SourceActivity, UploadMetadata,
    UploadOutcome,
};

const BASE: &str = "https://intervals.icu/api/v1";

/// User-supplied Intervals.icu credentials.
#[derive(Debug, Clone)]
pub struct IntervalsIcuCredentials {
    pub athlete_id: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Intervals.icu adapter over an [`HttpTransport`].
pub struct IntervalsIcuAdapter<T> {
    transport: T,
    credentials: IntervalsIcuCredentials,
}

impl<T: HttpTransport> IntervalsIcuAdapter<T> {
    pub fn new(transport: T, credentials: IntervalsIcuCredentials) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    fn auth_header(&self) -> String {
        // Intervals uses basic auth with the literal user "API_KEY".
        let raw = format!("API_KEY:{}", self.credentials.api_key);
        format!("Basic {}", BASE64.encode(raw))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.send(request).await.map_err(|e| match e {
            HttpError::Transport(message) => AdapterError::Transport { message },
            other => AdapterError::api(other.to_string()),
        })
    }
}

#[async_trait]
impl<T: HttpTransport> PlatformAdapter for IntervalsIcuAdapter<T> {
    fn platform(&self) -> Platform {
        Platform::IntervalsIcu
    }

    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            platform: Platform::IntervalsIcu,
            list_cost: 1,
            download_cost: 1,
            upload_cost: 1,
        }
    }

    fn supported_upload_formats(&self) -> Vec<FileFormat> {
        vec![FileFormat::Fit, FileFormat::Tcx, FileFormat::Gpx]
    }

    async fn list_activities(
        &self,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<SourceActivity>> {
        Err(AdapterError::api("intervals.icu is a destination only"))
    }

    async fn download(
        &self,
        _platform_id: &str,
        _preferred: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat)> {
        Err(AdapterError::api("intervals.icu is a destination only"))
    }

    async fn upload(
        &self,
        bytes: &[u8],
        format: FileFormat,
        metadata: &UploadMetadata,
    ) -> Result<UploadOutcome> {
        let url = format!(
            "{BASE}/athlete/{}/activities",
            self.credentials.athlete_id
        );

        let boundary = "fitsync-upload";
        let mut body = Vec::with_capacity(bytes.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"name\"\r\n\r\n{}\r\n",
                metadata.name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"activity.{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                format.extension()
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = HttpRequest::post(url, body)
            .header("Authorization", self.auth_header())
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            );

        let response = self.send(request).await?;
        match response.status {
            200 | 201 => {}
            401 | 403 => return Err(AdapterError::Unauthorized),
            422 => {
                // Intervals answers 422 when the file duplicates an
                // existing activity.
                let text = response.text().to_lowercase();
                if text.contains("duplicate") {
                    return Ok(UploadOutcome::Duplicate);
                }
                return Ok(UploadOutcome::Rejected {
                    reason: response.text(),
                });
            }
            429 => return Err(AdapterError::RateLimited { reset_at: None }),
            s if s >= 500 => {
                return Ok(UploadOutcome::TransientError {
                    message: format!("upload returned {s}"),
                });
            }
            s => {
                return Ok(UploadOutcome::Rejected {
                    reason: format!("intervals returned {s}"),
                });
            }
        }

        let parsed: UploadResponse = serde_json::from_slice(&response.body)
            .unwrap_or(UploadResponse {
                id: None,
                error: None,
            });

        if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
            if error.to_lowercase().contains("duplicate") {
                return Ok(UploadOutcome::Duplicate);
            }
            return Ok(UploadOutcome::Rejected { reason: error });
        }

        let remote_id = parsed
            .id
            .map(|v| v.to_string().trim_matches('"').to_string())
            .unwrap_or_default();
        Ok(UploadOutcome::Accepted { remote_id })
    }

    async fn health_check(&self) -> Health {
        match self.send(HttpRequest::get("https://intervals.icu")).await {
            Ok(resp) if resp.status < 500 => Health::Ok,
            Ok(_) => Health::Degraded,
            Err(_) => Health::Down,
        }
    }
}
