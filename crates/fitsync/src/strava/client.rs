//! Strava API client and adapter implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::entity::file_format::FileFormat;
use crate::entity::platform::Platform;
use crate::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{
    AdapterError, AdapterInfo, Health, PlatformAdapter, Result, SourceActivity, UploadMetadata,
    UploadOutcome,
};
use crate::retry::with_transient_retry;
use crate::sport::SportNormalizer;

use super::convert::to_source_activity;
use super::types::{StravaActivity, TokenResponse, UploadStatus};

const API_BASE: &str = "https://www.strava.com/api/v3";
const WEB_BASE: &str = "https://www.strava.com";
const TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Page size for activity listing. Strava caps at 200.
const LIST_PAGE_SIZE: usize = 100;

/// How many times an upload status is polled before reporting transient.
const UPLOAD_POLL_ATTEMPTS: u32 = 5;

/// Landmarks that identify a genuine Strava page in an HTML download
/// response. Their presence means the session is valid and the activity
/// simply has no original file; their absence means the cookie died.
const STRAVA_PAGE_LANDMARKS: &[&str] =
    &["strava", "activity", "manual", "no file", "not available"];

/// User-supplied Strava credentials.
///
/// The OAuth triple is persistent configuration. The session cookie is a
/// browser artifact the download path needs; it is the one field that
/// expires and gets rewritten.
#[derive(Debug, Clone)]
pub struct StravaCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Web session cookie for `export_original` downloads.
    pub session_cookie: Option<String>,
}

/// Strava adapter over an [`HttpTransport`].
pub struct StravaAdapter<T> {
    transport: T,
    credentials: StravaCredentials,
    normalizer: SportNormalizer,
    access_token: Mutex<Option<String>>,
}

impl<T: HttpTransport> StravaAdapter<T> {
    pub fn new(transport: T, credentials: StravaCredentials) -> Self {
        Self {
            transport,
            credentials,
            normalizer: SportNormalizer::builtin(),
            access_token: Mutex::new(None),
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport
            .send(request)
            .await
            .map_err(|e| match e {
                HttpError::Transport(message) => AdapterError::Transport { message },
                other => AdapterError::api(other.to_string()),
            })
    }

    /// Exchange the refresh token for an access token, caching the result
    /// for the life of this adapter.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let body = serde_json::json!({
            "client_id": self.credentials.client_id,
            "client_secret": self.credentials.client_secret,
            "refresh_token": self.credentials.refresh_token,
            "grant_type": "refresh_token",
        });
        let request = HttpRequest::post(TOKEN_URL, Vec::new())
            .json(&body)
            .map_err(|e| AdapterError::api(e.to_string()))?;

        let response = self.send(request).await?;
        if response.status == 400 || response.status == 401 {
            return Err(AdapterError::Unauthorized);
        }
        if response.status != 200 {
            return Err(classify_status(response.status, "token refresh"));
        }

        let token: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad token response: {e}")))?;

        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn list_page(
        &self,
        token: &str,
        after: i64,
        before: i64,
        per_page: usize,
        page: usize,
    ) -> Result<Vec<StravaActivity>> {
        let url = format!(
            "{API_BASE}/athlete/activities?after={after}&before={before}&per_page={per_page}&page={page}"
        );

        let response = with_transient_retry("strava list", || async {
            self.send(
                HttpRequest::get(&url).header("Authorization", format!("Bearer {token}")),
            )
            .await
        })
        .await?;

        if response.status != 200 {
            return Err(classify_status(response.status, "activity listing"));
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad activity list: {e}")))
    }

    /// Classify an HTML body that came back from `export_original`.
    fn classify_html_download(body: &str, activity_id: &str) -> AdapterError {
        let lower = body.to_lowercase();
        if STRAVA_PAGE_LANDMARKS.iter().any(|l| lower.contains(l)) {
            // A real Strava page served to a valid session: the activity
            // has no original file.
            AdapterError::no_original_file(activity_id)
        } else {
            AdapterError::Unauthorized
        }
    }
}

/// Detect the format of downloaded bytes. `export_original` serves the raw
/// device upload, which is FIT unless the device recorded XML.
fn detect_format(bytes: &[u8]) -> FileFormat {
    let head: String = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).to_lowercase();
    if head.contains("<trainingcenterdatabase") {
        FileFormat::Tcx
    } else if head.contains("<gpx") {
        FileFormat::Gpx
    } else {
        FileFormat::Fit
    }
}

fn classify_status(status: u16, context: &str) -> AdapterError {
    match status {
        401 | 403 => AdapterError::Unauthorized,
        404 => AdapterError::not_found(context.to_string()),
        429 => AdapterError::RateLimited { reset_at: None },
        s if s >= 500 => AdapterError::transport(format!("{context}: upstream {s}")),
        s => AdapterError::api(format!("{context}: unexpected status {s}")),
    }
}

/// Build a multipart/form-data body for the uploads endpoint.
fn multipart_upload_body(
    boundary: &str,
    bytes: &[u8],
    format: FileFormat,
    name: &str,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    let mut field = |key: &str, value: &str| {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{key}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    };

    field("data_type", format.extension());
    field("name", name);

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
    body
}

fn interpret_upload_status(status: &UploadStatus) -> Option<UploadOutcome> {
    if let Some(error) = status.error.as_deref().filter(|e| !e.is_empty()) {
        if error.to_lowercase().contains("duplicate") {
            return Some(UploadOutcome::Duplicate);
        }
        return Some(UploadOutcome::Rejected {
            reason: error.to_string(),
        });
    }
    status.activity_id.map(|id| UploadOutcome::Accepted {
        remote_id: id.to_string(),
    })
}

#[async_trait]
impl<T: HttpTransport> PlatformAdapter for StravaAdapter<T> {
    fn platform(&self) -> Platform {
        Platform::Strava
    }

    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            platform: Platform::Strava,
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
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceActivity>> {
        let token = self.access_token().await?;
        let per_page = limit.clamp(1, LIST_PAGE_SIZE);
        let mut collected = Vec::new();
        let mut page = 1;

        loop {
            let batch = self
                .list_page(&token, since.timestamp(), until.timestamp(), per_page, page)
                .await?;
            let batch_len = batch.len();

            collected.extend(
                batch
                    .iter()
                    .map(|a| to_source_activity(a, &self.normalizer)),
            );

            if batch_len < per_page || collected.len() >= limit {
                break;
            }
            page += 1;
        }

        collected.truncate(limit);
        Ok(collected)
    }

    async fn download(
        &self,
        platform_id: &str,
        _preferred: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat)> {
        let cookie = self
            .credentials
            .session_cookie
            .as_deref()
            .ok_or(AdapterError::Unauthorized)?;

        let url = format!("{WEB_BASE}/activities/{platform_id}/export_original");
        let response = with_transient_retry("strava download", || async {
            self.send(
                HttpRequest::get(&url)
                    .header("Cookie", cookie)
                    .header("User-Agent", "Mozilla/5.0"),
            )
            .await
        })
        .await?;

        if response.status != 200 {
            return Err(classify_status(response.status, platform_id));
        }

        // Strava answers 200 with an HTML page both for manual activities
        // and for dead sessions; only the page content tells them apart.
        let is_html = response
            .header("content-type")
            .is_some_and(|ct| ct.to_lowercase().contains("text/html"))
            || response.body.trim_ascii_start().starts_with(b"<");
        if is_html {
            return Err(Self::classify_html_download(&response.text(), platform_id));
        }

        let format = detect_format(&response.body);
        Ok((response.body, format))
    }

    async fn upload(
        &self,
        bytes: &[u8],
        format: FileFormat,
        metadata: &UploadMetadata,
    ) -> Result<UploadOutcome> {
        let token = self.access_token().await?;

        let boundary = format!("fitsync-{}", metadata.start_time.timestamp());
        let body = multipart_upload_body(&boundary, bytes, format, &metadata.name);
        let request = HttpRequest::post(format!("{API_BASE}/uploads"), body)
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            );

        let response = self.send(request).await?;
        if response.status == 429 {
            return Err(AdapterError::RateLimited { reset_at: None });
        }
        if response.status >= 500 {
            return Ok(UploadOutcome::TransientError {
                message: format!("upload returned {}", response.status),
            });
        }
        if response.status != 200 && response.status != 201 {
            return Err(classify_status(response.status, "upload"));
        }

        let mut status: UploadStatus = serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad upload response: {e}")))?;

        // Processing is asynchronous on Strava's side; poll until terminal.
        for _ in 0..UPLOAD_POLL_ATTEMPTS {
            if let Some(outcome) = interpret_upload_status(&status) {
                return Ok(outcome);
            }
            let Some(upload_id) = status.id else { break };

            tokio::time::sleep(std::time::Duration::from_millis(1_000)).await;
            let poll = self
                .send(
                    HttpRequest::get(format!("{API_BASE}/uploads/{upload_id}"))
                        .header("Authorization", format!("Bearer {token}")),
                )
                .await?;
            if poll.status != 200 {
                break;
            }
            status = serde_json::from_slice(&poll.body)
                .map_err(|e| AdapterError::api(format!("bad upload poll: {e}")))?;
        }

        Ok(UploadOutcome::TransientError {
            message: "upload still processing".to_string(),
        })
    }

    async fn health_check(&self) -> Health {
        match self.send(HttpRequest::get(WEB_BASE)).await {
            Ok(resp) if resp.status < 500 => Health::Ok,
            Ok(_) => Health::Degraded,
            Err(_) => Health::Down,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MockTransport};
    use chrono::TimeZone;

    fn credentials() -> StravaCredentials {
        StravaCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
            session_cookie: Some("session=abc".to_string()),
        }
    }

    fn adapter(transport: MockTransport) -> StravaAdapter<MockTransport> {
        StravaAdapter::new(transport, credentials())
    }

    fn push_token(transport: &MockTransport) {
        transport.push_ok(
            HttpMethod::Post,
            TOKEN_URL,
            br#"{"access_token": "token123"}"#,
        );
    }

    #[tokio::test]
    async fn list_activities_refreshes_token_and_parses_page() {
        let transport = MockTransport::new();
        push_token(&transport);

        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let url = format!(
            "{API_BASE}/athlete/activities?after={}&before={}&per_page=10&page=1",
            since.timestamp(),
            until.timestamp()
        );
        transport.push_ok(
            HttpMethod::Get,
            url,
            br#"[{
                "id": 101,
                "name": "Morning Ride",
                "sport_type": "Ride",
                "start_date": "2025-01-10T06:00:00Z",
                "distance": 20034.0,
                "elapsed_time": 3612,
                "upload_id": 555,
                "device_name": "Edge 530",
                "external_id": "a.fit"
            }]"#,
        );

        let adapter = adapter(transport);
        let activities = adapter.list_activities(since, until, 10).await.unwrap();

        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].platform_id, "101");
        assert!(!activities[0].manual);
    }

    #[tokio::test]
    async fn expired_refresh_token_surfaces_unauthorized() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            TOKEN_URL,
            HttpResponse {
                status: 400,
                headers: Vec::new(),
                body: br#"{"message": "Bad Request"}"#.to_vec(),
            },
        );

        let adapter = adapter(transport);
        let err = adapter
            .list_activities(Utc::now(), Utc::now(), 10)
            .await
            .expect_err("bad refresh token should fail");
        assert!(matches!(err, AdapterError::Unauthorized));
    }

    #[tokio::test]
    async fn download_detects_manual_activity_from_html_landmarks() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{WEB_BASE}/activities/99/export_original"),
            HttpResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "text/html".to_string())],
                body: b"<html><body>Strava activity has no file</body></html>".to_vec(),
            },
        );

        let adapter = adapter(transport);
        let err = adapter
            .download("99", FileFormat::Fit)
            .await
            .expect_err("manual activity has no file");
        assert!(matches!(err, AdapterError::NoOriginalFile { .. }));
    }

    #[tokio::test]
    async fn download_distinguishes_dead_session_from_manual() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{WEB_BASE}/activities/99/export_original"),
            HttpResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "text/html".to_string())],
                body: b"<html><body>redirecting to signin</body></html>".to_vec(),
            },
        );

        let adapter = adapter(transport);
        let err = adapter
            .download("99", FileFormat::Fit)
            .await
            .expect_err("dead cookie should fail auth");
        assert!(matches!(err, AdapterError::Unauthorized));
    }

    #[tokio::test]
    async fn download_returns_fit_bytes() {
        let transport = MockTransport::new();
        transport.push_ok(
            HttpMethod::Get,
            format!("{WEB_BASE}/activities/99/export_original"),
            &[0x0e, 0x10, 0x43, 0x08, b'.', b'F', b'I', b'T'],
        );

        let adapter = adapter(transport);
        let (bytes, format) = adapter.download("99", FileFormat::Fit).await.unwrap();
        assert_eq!(format, FileFormat::Fit);
        assert_eq!(bytes.len(), 8);
    }

    #[tokio::test]
    async fn download_without_cookie_requires_auth() {
        let adapter = StravaAdapter::new(
            MockTransport::new(),
            StravaCredentials {
                session_cookie: None,
                ..credentials()
            },
        );
        let err = adapter
            .download("99", FileFormat::Fit)
            .await
            .expect_err("no cookie, no download");
        assert!(matches!(err, AdapterError::Unauthorized));
    }

    #[tokio::test]
    async fn upload_duplicate_is_a_success_variant() {
        let transport = MockTransport::new();
        push_token(&transport);
        transport.push_ok(
            HttpMethod::Post,
            format!("{API_BASE}/uploads"),
            br#"{"id": 7, "error": "activity.fit duplicate of activity 12345", "status": "error"}"#,
        );

        let adapter = adapter(transport);
        let outcome = adapter
            .upload(
                b"fit",
                FileFormat::Fit,
                &UploadMetadata {
                    name: "Ride".to_string(),
                    sport: crate::entity::sport::Sport::Ride,
                    start_time: Utc.with_ymd_and_hms(2025, 1, 10, 6, 0, 0).unwrap(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Duplicate);
    }

    #[tokio::test]
    async fn upload_accepted_carries_remote_id() {
        let transport = MockTransport::new();
        push_token(&transport);
        transport.push_ok(
            HttpMethod::Post,
            format!("{API_BASE}/uploads"),
            br#"{"id": 7, "activity_id": 4242, "status": "ready"}"#,
        );

        let adapter = adapter(transport);
        let outcome = adapter
            .upload(
                b"fit",
                FileFormat::Fit,
                &UploadMetadata {
                    name: "Ride".to_string(),
                    sport: crate::entity::sport::Sport::Ride,
                    start_time: Utc.with_ymd_and_hms(2025, 1, 10, 6, 0, 0).unwrap(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            UploadOutcome::Accepted {
                remote_id: "4242".to_string()
            }
        );
    }

    #[test]
    fn format_detection_from_magic_bytes() {
        assert_eq!(detect_format(b"<gpx version=\"1.1\">"), FileFormat::Gpx);
        assert_eq!(
            detect_format(b"<TrainingCenterDatabase>"),
            FileFormat::Tcx
        );
        assert_eq!(detect_format(&[0x0e, 0x10, 0x43]), FileFormat::Fit);
    }
}
