//! iGPSPORT API client and adapter implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::entity::file_format::FileFormat;
use crate::entity::platform::Platform;
use crate::entity::sport::Sport;
use crate::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{
    AdapterError, AdapterInfo, Health, PlatformAdapter, Result, SourceActivity, UploadMetadata,
    UploadOutcome,
};
use crate::retry::with_transient_retry;

const BASE: &str = "https://prod.zh.igpsport.com";

/// User-supplied iGPSPORT credentials.
#[derive(Debug, Clone)]
pub struct IgpsportCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<D> {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    data: Option<D>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityPage {
    #[serde(default)]
    rows: Vec<Ride>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ride {
    ride_id: i64,
    #[serde(default)]
    title: Option<String>,
    /// `"2025-01-10 06:00:00"`, UTC.
    start_time: String,
    #[serde(default)]
    total_distance: Option<f64>,
    #[serde(default)]
    total_moving_time: Option<i64>,
    #[serde(default)]
    total_ascent: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RideDetail {
    #[serde(default)]
    fit_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadData {
    #[serde(default)]
    ride_id: Option<i64>,
}

/// iGPSPORT adapter over an [`HttpTransport`].
pub struct IgpsportAdapter<T> {
    transport: T,
    credentials: IgpsportCredentials,
    token: Mutex<Option<String>>,
}

impl<T: HttpTransport> IgpsportAdapter<T> {
    pub fn new(transport: T, credentials: IgpsportCredentials) -> Self {
        Self {
            transport,
            credentials,
            token: Mutex::new(None),
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.send(request).await.map_err(|e| match e {
            HttpError::Transport(message) => AdapterError::Transport { message },
            other => AdapterError::api(other.to_string()),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let body = serde_json::json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
            "appId": "igpsport-web",
        });
        let request = HttpRequest::post(format!("{BASE}/service/auth/account/login"), Vec::new())
            .json(&body)
            .map_err(|e| AdapterError::api(e.to_string()))?;

        let response = self.send(request).await?;
        if response.status == 401 || response.status == 403 {
            return Err(AdapterError::Unauthorized);
        }
        if response.status != 200 {
            return Err(classify_status(response.status, "login"));
        }

        let envelope: Envelope<LoginData> = serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad login response: {e}")))?;
        let data = envelope.data.ok_or(AdapterError::Unauthorized)?;

        *cached = Some(data.access_token.clone());
        Ok(data.access_token)
    }

    async fn get_json<D: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        context: &str,
    ) -> Result<D> {
        let response = with_transient_retry(context, || async {
            self.send(
                HttpRequest::get(url).header("Authorization", format!("Bearer {token}")),
            )
            .await
        })
        .await?;

        if response.status != 200 {
            return Err(classify_status(response.status, context));
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad {context} response: {e}")))
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

fn parse_start_time(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| AdapterError::api(format!("bad start time {raw:?}: {e}")))
}

#[async_trait]
impl<T: HttpTransport> PlatformAdapter for IgpsportAdapter<T> {
    fn platform(&self) -> Platform {
        Platform::Igpsport
    }

    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            platform: Platform::Igpsport,
            list_cost: 1,
            download_cost: 2,
            upload_cost: 1,
        }
    }

    fn supported_upload_formats(&self) -> Vec<FileFormat> {
        vec![FileFormat::Fit]
    }

    async fn list_activities(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceActivity>> {
        let token = self.access_token().await?;
        let url = format!(
            "{BASE}/service/web-gateway/web-analyze/activity/queryMyActivity?pageNo=1&pageSize={limit}&reqType=0&sort=1"
        );

        let envelope: Envelope<ActivityPage> = self.get_json(&url, &token, "ride listing").await?;
        let page = envelope.data.unwrap_or(ActivityPage { rows: Vec::new() });

        let mut activities = Vec::new();
        for ride in &page.rows {
            let start_time = parse_start_time(&ride.start_time)?;
            if start_time < since || start_time > until {
                continue;
            }
            activities.push(SourceActivity {
                platform_id: ride.ride_id.to_string(),
                name: ride
                    .title
                    .clone()
                    .unwrap_or_else(|| "Untitled Ride".to_string()),
                sport: Sport::Ride,
                start_time,
                distance: ride.total_distance.unwrap_or(0.0),
                duration: ride.total_moving_time.unwrap_or(0),
                elevation_gain: ride.total_ascent,
                manual: false,
                available_formats: vec![FileFormat::Fit],
            });
        }

        Ok(activities)
    }

    async fn download(
        &self,
        platform_id: &str,
        _preferred: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat)> {
        let token = self.access_token().await?;
        let url = format!(
            "{BASE}/service/web-gateway/web-analyze/activity/queryActivityDetail/{platform_id}/0"
        );

        let envelope: Envelope<RideDetail> = self.get_json(&url, &token, "ride detail").await?;
        let fit_url = envelope
            .data
            .and_then(|d| d.fit_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AdapterError::no_original_file(platform_id))?;

        let response = with_transient_retry("igpsport fit download", || async {
            self.send(HttpRequest::get(&fit_url)).await
        })
        .await?;

        if response.status != 200 {
            return Err(classify_status(response.status, platform_id));
        }

        Ok((response.body, FileFormat::Fit))
    }

    async fn upload(
        &self,
        bytes: &[u8],
        format: FileFormat,
        _metadata: &UploadMetadata,
    ) -> Result<UploadOutcome> {
        if format != FileFormat::Fit {
            return Ok(UploadOutcome::Rejected {
                reason: format!("igpsport only accepts FIT, got {format}"),
            });
        }

        let token = self.access_token().await?;
        let boundary = "fitsync-upload";
        let mut body = Vec::with_capacity(bytes.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"activity.fit\"\r\n\
              Content-Type: application/octet-stream\r\n\r\n",
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = HttpRequest::post(
            format!("{BASE}/service/mobile/api/Upload/UploadFile"),
            body,
        )
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
        if response.status != 200 {
            return Err(classify_status(response.status, "upload"));
        }

        let envelope: Envelope<UploadData> = serde_json::from_slice(&response.body)
            .map_err(|e| AdapterError::api(format!("bad upload response: {e}")))?;

        let msg = envelope.msg.unwrap_or_default();
        match envelope.code {
            Some(0) => {
                let remote_id = envelope
                    .data
                    .and_then(|d| d.ride_id)
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                Ok(UploadOutcome::Accepted { remote_id })
            }
            _ if msg.to_lowercase().contains("duplicate") || msg.contains("已存在") => {
                Ok(UploadOutcome::Duplicate)
            }
            _ => Ok(UploadOutcome::Rejected { reason: msg }),
        }
    }

    async fn health_check(&self) -> Health {
        match self.send(HttpRequest::get(BASE)).await {
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

    fn adapter(transport: MockTransport) -> IgpsportAdapter<MockTransport> {
        IgpsportAdapter::new(
            transport,
            IgpsportCredentials {
                username: "rider".to_string(),
                password: "pw".to_string(),
            },
        )
    }

    fn push_login(transport: &MockTransport) {
        transport.push_ok(
            HttpMethod::Post,
            format!("{BASE}/service/auth/account/login"),
            br#"{"code": 0, "data": {"accessToken": "tok"}}"#,
        );
    }

    #[tokio::test]
    async fn list_filters_to_window_and_is_always_a_ride() {
        let transport = MockTransport::new();
        push_login(&transport);
        transport.push_ok(
            HttpMethod::Get,
            format!(
                "{BASE}/service/web-gateway/web-analyze/activity/queryMyActivity?pageNo=1&pageSize=10&reqType=0&sort=1"
            ),
            br#"{"code": 0, "data": {"rows": [
                {"rideId": 31, "title": "Commute", "startTime": "2025-01-10 06:00:00",
                 "totalDistance": 12000.0, "totalMovingTime": 1800, "totalAscent": 80.0},
                {"rideId": 32, "startTime": "2024-06-01 06:00:00",
                 "totalDistance": 9000.0, "totalMovingTime": 1500}
            ]}}"#,
        );

        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let adapter = adapter(transport);
        let activities = adapter.list_activities(since, until, 10).await.unwrap();

        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].platform_id, "31");
        assert_eq!(activities[0].sport, Sport::Ride);
    }

    #[tokio::test]
    async fn download_follows_the_fit_url() {
        let transport = MockTransport::new();
        push_login(&transport);
        transport.push_ok(
            HttpMethod::Get,
            format!("{BASE}/service/web-gateway/web-analyze/activity/queryActivityDetail/31/0"),
            br#"{"code": 0, "data": {"fitUrl": "https://oss.example.com/31.fit"}}"#,
        );
        transport.push_ok(HttpMethod::Get, "https://oss.example.com/31.fit", b"fitdata");

        let adapter = adapter(transport);
        let (bytes, format) = adapter.download("31", FileFormat::Fit).await.unwrap();
        assert_eq!(bytes, b"fitdata".to_vec());
        assert_eq!(format, FileFormat::Fit);
    }

    #[tokio::test]
    async fn missing_fit_url_means_no_original_file() {
        let transport = MockTransport::new();
        push_login(&transport);
        transport.push_ok(
            HttpMethod::Get,
            format!("{BASE}/service/web-gateway/web-analyze/activity/queryActivityDetail/31/0"),
            br#"{"code": 0, "data": {}}"#,
        );

        let adapter = adapter(transport);
        let err = adapter
            .download("31", FileFormat::Fit)
            .await
            .expect_err("no fit url");
        assert!(matches!(err, AdapterError::NoOriginalFile { .. }));
    }

    #[tokio::test]
    async fn non_fit_upload_is_rejected_without_a_network_call() {
        let adapter = adapter(MockTransport::new());
        let outcome = adapter
            .upload(
                b"gpx",
                FileFormat::Gpx,
                &UploadMetadata {
                    name: "Ride".to_string(),
                    sport: Sport::Ride,
                    start_time: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, UploadOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn duplicate_message_maps_to_duplicate() {
        let transport = MockTransport::new();
        push_login(&transport);
        transport.push_ok(
            HttpMethod::Post,
            format!("{BASE}/service/mobile/api/Upload/UploadFile"),
            br#"{"code": 1, "msg": "activity duplicate"}"#.as_slice(),
        );

        let adapter = adapter(transport);
        let outcome = adapter
            .upload(
                b"fit",
                FileFormat::Fit,
                &UploadMetadata {
                    name: "Ride".to_string(),
                    sport: Sport::Ride,
                    start_time: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Duplicate);
    }
}
