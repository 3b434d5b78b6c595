//! Garmin Connect API client and adapter implementation.

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
use super::types::{GarminActivity, SsoTokenResponse, UploadResponse};

const INTERNATIONAL_HOST: &str = "https://connectapi.garmin.com";
const CHINA_HOST: &str = "https://connectapi.garmin.cn";
const INTERNATIONAL_SSO_HOST: &str = "https://sso.garmin.com";
const CHINA_SSO_HOST: &str = "https://sso.garmin.cn";

/// User-supplied Garmin credentials.
///
/// Username and password are persistent configuration and drive the SSO
/// sign-in. The session token is the artifact that sign-in produces; a
/// stored one is reused until it stops working, and `--clear-session`
/// drops it to force a fresh sign-in.
#[derive(Debug, Clone)]
pub struct GarminCredentials {
    pub username: String,
    pub password: String,
    /// Bearer token of a previously authenticated Connect session.
    pub session_token: Option<String>,
}

/// Garmin Connect adapter over an [`HttpTransport`].
///
/// Constructed per region; the two deployments share everything except
/// hosts, credentials, and catalog identity.
pub struct GarminAdapter<T> {
    transport: T,
    platform: Platform,
    host: String,
    sso_host: String,
    credentials: GarminCredentials,
    normalizer: SportNormalizer,
    session: Mutex<Option<String>>,
}

impl<T: HttpTransport> GarminAdapter<T> {
    /// Adapter for the international deployment.
    pub fn international(transport: T, credentials: GarminCredentials) -> Self {
        Self::for_region(
            transport,
            credentials,
            Platform::Garmin,
            INTERNATIONAL_HOST,
            INTERNATIONAL_SSO_HOST,
        )
    }

    /// Adapter for the China-region deployment.
    pub fn china(transport: T, credentials: GarminCredentials) -> Self {
        Self::for_region(
            transport,
            credentials,
            Platform::GarminCn,
            CHINA_HOST,
            CHINA_SSO_HOST,
        )
    }

    fn for_region(
        transport: T,
        credentials: GarminCredentials,
        platform: Platform,
        host: &str,
        sso_host: &str,
    ) -> Self {
        let session = Mutex::new(credentials.session_token.clone());
        Self {
            transport,
            platform,
            host: host.to_string(),
            sso_host: sso_host.to_string(),
            credentials,
            normalizer: SportNormalizer::builtin(),
            session,
        }
    }

    /// The current session token, signing in with username/password when
    /// no stored session exists.
    async fn token(&self) -> Result<String> {
        let mut cached = self.session.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let body = serde_json::json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });
        let request = HttpRequest::post(format!("{}/sso/signin", self.sso_host), Vec::new())
            .json(&body)
            .map_err(|e| AdapterError::api(e.to_string()))?;

        let response = self.send(request).await?;
        if response.status == 401 || response.status == 403 {
            return Err(AdapterError::Unauthorized);
        }
        if response.status != 200 {
            return Err(self.classify(response.status, "sso signin"));
        }

        let parsed: SsoTokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad signin response: {e}")))?;

        *cached = Some(parsed.access_token.clone());
        Ok(parsed.access_token)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.send(request).await.map_err(|e| match e {
            HttpError::Transport(message) => AdapterError::Transport { message },
            other => AdapterError::api(other.to_string()),
        })
    }

    fn classify(&self, status: u16, context: &str) -> AdapterError {
        match status {
            401 | 403 => AdapterError::Unauthorized,
            404 => AdapterError::not_found(context.to_string()),
            429 => AdapterError::RateLimited { reset_at: None },
            s if s >= 500 => AdapterError::transport(format!("{context}: upstream {s}")),
            s => AdapterError::api(format!("{context}: unexpected status {s}")),
        }
    }
}

fn interpret_upload(response: &UploadResponse) -> UploadOutcome {
    let Some(result) = response.detailed_import_result.as_ref() else {
        return UploadOutcome::TransientError {
            message: "upload response missing import result".to_string(),
        };
    };

    if let Some(success) = result.successes.first() {
        if let Some(id) = success.internal_id {
            return UploadOutcome::Accepted {
                remote_id: id.to_string(),
            };
        }
    }

    for failure in &result.failures {
        for message in &failure.messages {
            let content = message.content.as_deref().unwrap_or("");
            if content.to_lowercase().contains("duplicate") {
                return UploadOutcome::Duplicate;
            }
        }
    }

    let reason = result
        .failures
        .iter()
        .flat_map(|f| f.messages.iter())
        .filter_map(|m| m.content.clone())
        .collect::<Vec<_>>()
        .join("; ");

    if reason.is_empty() {
        UploadOutcome::TransientError {
            message: "upload reported neither success nor failure".to_string(),
        }
    } else {
        UploadOutcome::Rejected { reason }
    }
}

#[async_trait]
impl<T: HttpTransport> PlatformAdapter for GarminAdapter<T> {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            platform: self.platform,
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
        let token = self.token().await?;
        let url = format!(
            "{}/activitylist-service/activities/search/activities?start=0&limit={}&startDate={}&endDate={}",
            self.host,
            limit,
            since.format("%Y-%m-%d"),
            until.format("%Y-%m-%d"),
        );

        let response = with_transient_retry("garmin list", || async {
            self.send(
                HttpRequest::get(&url).header("Authorization", format!("Bearer {token}")),
            )
            .await
        })
        .await?;

        if response.status != 200 {
            return Err(self.classify(response.status, "activity listing"));
        }

        let raw: Vec<GarminActivity> = serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad activity list: {e}")))?;

        let mut activities = Vec::with_capacity(raw.len());
        for activity in &raw {
            let converted = to_source_activity(activity, &self.normalizer)?;
            // The search endpoint filters by local date only; trim to the
            // requested window so the cursor math stays exact.
            if converted.start_time >= since && converted.start_time <= until {
                activities.push(converted);
            }
        }

        Ok(activities)
    }

    async fn download(
        &self,
        platform_id: &str,
        _preferred: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat)> {
        let token = self.token().await?;
        let url = format!("{}/download-service/files/activity/{platform_id}", self.host);

        let response = with_transient_retry("garmin download", || async {
            self.send(
                HttpRequest::get(&url).header("Authorization", format!("Bearer {token}")),
            )
            .await
        })
        .await?;

        if response.status != 200 {
            return Err(self.classify(response.status, platform_id));
        }
        if response.body.is_empty() {
            return Err(AdapterError::no_original_file(platform_id));
        }

        Ok((response.body, FileFormat::Fit))
    }

    async fn upload(
        &self,
        bytes: &[u8],
        format: FileFormat,
        _metadata: &UploadMetadata,
    ) -> Result<UploadOutcome> {
        let token = self.token().await?;
        let url = format!("{}/upload-service/upload/.{}", self.host, format.extension());

        let boundary = "fitsync-upload";
        let mut body = Vec::with_capacity(bytes.len() + 256);
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
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            );

        let response = self.send(request).await?;
        match response.status {
            // 409 is Garmin's native duplicate answer.
            409 => return Ok(UploadOutcome::Duplicate),
            429 => return Err(AdapterError::RateLimited { reset_at: None }),
            s if s >= 500 => {
                return Ok(UploadOutcome::TransientError {
                    message: format!("upload returned {s}"),
                });
            }
            200 | 201 | 202 => {}
            s => return Err(self.classify(s, "upload")),
        }

        let parsed: UploadResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad upload response: {e}")))?;
        Ok(interpret_upload(&parsed))
    }

    async fn health_check(&self) -> Health {
        match self.send(HttpRequest::get(&self.host)).await {
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

    fn credentials() -> GarminCredentials {
        GarminCredentials {
            username: "athlete@example.com".to_string(),
            password: "pw".to_string(),
            session_token: Some("session-token".to_string()),
        }
    }

    #[tokio::test]
    async fn china_and_international_use_their_own_hosts() {
        let intl = GarminAdapter::international(MockTransport::new(), credentials());
        let cn = GarminAdapter::china(MockTransport::new(), credentials());
        assert_eq!(intl.platform(), Platform::Garmin);
        assert_eq!(cn.platform(), Platform::GarminCn);
        assert_eq!(intl.host, INTERNATIONAL_HOST);
        assert_eq!(cn.host, CHINA_HOST);
    }

    #[tokio::test]
    async fn list_trims_to_the_requested_window() {
        let transport = MockTransport::new();
        let since = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let url = format!(
            "{INTERNATIONAL_HOST}/activitylist-service/activities/search/activities?start=0&limit=10&startDate=2025-01-10&endDate=2025-01-10"
        );
        transport.push_ok(
            HttpMethod::Get,
            url,
            br#"[
                {"activityId": 1, "startTimeGMT": "2025-01-10 06:00:00",
                 "activityType": {"typeKey": "cycling"}, "distance": 20000.0, "duration": 3600.0},
                {"activityId": 2, "startTimeGMT": "2025-01-10 20:00:00",
                 "activityType": {"typeKey": "cycling"}, "distance": 5000.0, "duration": 900.0}
            ]"#,
        );

        let adapter = GarminAdapter::international(transport, credentials());
        let activities = adapter.list_activities(since, until, 10).await.unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].platform_id, "1");
    }

    #[tokio::test]
    async fn missing_session_signs_in_with_username_and_password() {
        let transport = MockTransport::new();
        transport.push_ok(
            HttpMethod::Post,
            format!("{INTERNATIONAL_SSO_HOST}/sso/signin"),
            br#"{"accessToken": "fresh-token"}"#,
        );
        transport.push_ok(
            HttpMethod::Get,
            format!(
                "{INTERNATIONAL_HOST}/activitylist-service/activities/search/activities?start=0&limit=10&startDate=2025-01-10&endDate=2025-01-10"
            ),
            b"[]",
        );

        let adapter = GarminAdapter::international(
            transport.clone(),
            GarminCredentials {
                session_token: None,
                ..credentials()
            },
        );

        let since = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let activities = adapter.list_activities(since, until, 10).await.unwrap();
        assert!(activities.is_empty());

        // The sign-in carried the configured credentials and the listing
        // reused the fresh token.
        let requests = transport.requests();
        let signin = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(signin.contains("athlete@example.com"));
        assert!(signin.contains("pw"));
        assert!(
            requests[1]
                .headers
                .iter()
                .any(|(k, v)| k == "Authorization" && v == "Bearer fresh-token")
        );
    }

    #[tokio::test]
    async fn rejected_sign_in_is_unauthorized() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            format!("{INTERNATIONAL_SSO_HOST}/sso/signin"),
            HttpResponse {
                status: 401,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        let adapter = GarminAdapter::international(
            transport,
            GarminCredentials {
                session_token: None,
                ..credentials()
            },
        );
        let err = adapter
            .list_activities(Utc::now(), Utc::now(), 10)
            .await
            .expect_err("bad password should fail auth");
        assert!(matches!(err, AdapterError::Unauthorized));
    }

    #[tokio::test]
    async fn empty_download_body_means_no_original_file() {
        let transport = MockTransport::new();
        transport.push_ok(
            HttpMethod::Get,
            format!("{INTERNATIONAL_HOST}/download-service/files/activity/1"),
            b"",
        );

        let adapter = GarminAdapter::international(transport, credentials());
        let err = adapter
            .download("1", FileFormat::Fit)
            .await
            .expect_err("empty body has no file");
        assert!(matches!(err, AdapterError::NoOriginalFile { .. }));
    }

    #[tokio::test]
    async fn upload_conflict_status_maps_to_duplicate() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            format!("{INTERNATIONAL_HOST}/upload-service/upload/.fit"),
            HttpResponse {
                status: 409,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        let adapter = GarminAdapter::international(transport, credentials());
        let outcome = adapter
            .upload(
                b"fit",
                FileFormat::Fit,
                &UploadMetadata {
                    name: "Ride".to_string(),
                    sport: crate::entity::sport::Sport::Ride,
                    start_time: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Duplicate);
    }

    #[tokio::test]
    async fn upload_success_extracts_internal_id() {
        let transport = MockTransport::new();
        transport.push_ok(
            HttpMethod::Post,
            format!("{INTERNATIONAL_HOST}/upload-service/upload/.fit"),
            br#"{"detailedImportResult": {"successes": [{"internalId": 777}], "failures": []}}"#,
        );

        let adapter = GarminAdapter::international(transport, credentials());
        let outcome = adapter
            .upload(
                b"fit",
                FileFormat::Fit,
                &UploadMetadata {
                    name: "Ride".to_string(),
                    sport: crate::entity::sport::Sport::Ride,
                    start_time: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            UploadOutcome::Accepted {
                remote_id: "777".to_string()
            }
        );
    }

    #[tokio::test]
    async fn upload_duplicate_message_maps_to_duplicate() {
        let transport = MockTransport::new();
        transport.push_ok(
            HttpMethod::Post,
            format!("{INTERNATIONAL_HOST}/upload-service/upload/.fit"),
            br#"{"detailedImportResult": {"successes": [], "failures": [
                {"messages": [{"content": "Duplicate Activity"}]}
            ]}}"#,
        );

        let adapter = GarminAdapter::international(transport, credentials());
        let outcome = adapter
            .upload(
                b"fit",
                FileFormat::Fit,
                &UploadMetadata {
                    name: "Ride".to_string(),
                    sport: crate::entity::sport::Sport::Ride,
                    start_time: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Duplicate);
    }
}
