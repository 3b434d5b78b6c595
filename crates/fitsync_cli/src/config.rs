//! Configuration file support.
//!
//! Configuration is loaded with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables prefixed `FITSYNC_` (double underscore as the
//!    section separator, e.g. `FITSYNC_STRAVA__CLIENT_ID`)
//! 3. `.app_config.json` in the working directory
//! 4. Built-in defaults
//!
//! Credential fields are user-supplied and persistent. Session fields
//! (Strava's web cookie, Garmin's bearer token) are browser or SSO
//! artifacts that expire; `sync --clear-session <platform>` drops one so
//! the next run fails cleanly with an auth prompt instead of an opaque
//! download error.
//!
//! Example `.app_config.json`:
//! ```json
//! {
//!   "database": { "path": "sync_database.db" },
//!   "cache": { "dir": "activity_cache", "ttl_days": 30 },
//!   "converter": { "program": "/usr/local/bin/fit-convert" },
//!   "strava": {
//!     "client_id": "12345",
//!     "client_secret": "...",
//!     "refresh_token": "...",
//!     "session_cookie": "_strava4_session=..."
//!   },
//!   "garmin": { "username": "a@b.c", "password": "...", "session_token": "..." },
//!   "sync": { "batch_size": 10 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat as ConfigFileFormat};
use serde::Deserialize;

use fitsync::garmin::{GarminAdapter, GarminCredentials};
use fitsync::http::reqwest_transport::ReqwestTransport;
use fitsync::igpsport::{IgpsportAdapter, IgpsportCredentials};
use fitsync::intervals_icu::{IntervalsIcuAdapter, IntervalsIcuCredentials};
use fitsync::onedrive::{OnedriveAdapter, OnedriveCredentials};
use fitsync::platform::{AdapterRegistry, RateLimitedAdapter, default_rps_for_platform};
use fitsync::strava::{StravaAdapter, StravaCredentials};
use fitsync::transcode::{CommandTranscoder, NullTranscoder, Transcoder};
use fitsync::{Platform, sync::DEFAULT_BATCH_SIZE};

/// Config file name in the working directory.
pub const CONFIG_FILE: &str = ".app_config.json";

/// Upper bound of any single adapter request (the upload ceiling).
const HTTP_TIMEOUT: StdDuration = StdDuration::from_secs(180);

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub converter: ConverterConfig,
    pub strava: StravaConfig,
    pub garmin: GarminConfig,
    pub garmin_cn: GarminConfig,
    pub igpsport: IgpsportConfig,
    pub onedrive: OnedriveConfig,
    pub intervals_icu: IntervalsIcuConfig,
    pub sync: SyncDefaults,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Catalog path; defaults to `sync_database.db` in the project root.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory; defaults to `activity_cache`.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// External converter binary for FIT/TCX/GPX transcoding.
    pub program: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StravaConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// Session field, rewritten by `--clear-session strava`.
    pub session_cookie: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GarminConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Session field, rewritten by `--clear-session garmin`.
    pub session_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IgpsportConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OnedriveConfig {
    pub client_id: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IntervalsIcuConfig {
    pub athlete_id: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncDefaults {
    pub batch_size: usize,
    /// Disable per-second request pacing (the windowed budget still holds).
    pub no_rate_limit: bool,
}

impl Default for SyncDefaults {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            no_rate_limit: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        ConfigBuilder::builder()
            .add_source(
                File::new(CONFIG_FILE, ConfigFileFormat::Json).required(false),
            )
            .add_source(Environment::with_prefix("FITSYNC").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Catalog connection URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        let path = self
            .database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("sync_database.db"));
        format!("sqlite://{}?mode=rwc", path.display())
    }

    /// Path of the legacy JSON store, next to the catalog.
    #[must_use]
    pub fn legacy_store_path(&self) -> PathBuf {
        PathBuf::from("sync_database.json")
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("activity_cache"))
    }

    /// The configured transcoder, or the null one when no converter binary
    /// is set up.
    #[must_use]
    pub fn transcoder(&self) -> Box<dyn Transcoder> {
        match &self.converter.program {
            Some(program) => Box::new(CommandTranscoder::new(program)),
            None => Box::new(NullTranscoder),
        }
    }

    /// Build the adapter registry from every configured platform.
    ///
    /// Platforms without credentials are simply absent; a direction naming
    /// one fails with a missing-adapter error rather than a network error.
    pub fn build_registry(&self) -> Result<AdapterRegistry, String> {
        let mut registry = AdapterRegistry::new();
        let transport = ReqwestTransport::with_timeout(HTTP_TIMEOUT)
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        let pace = !self.sync.no_rate_limit;

        if let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            self.strava.client_id.clone(),
            self.strava.client_secret.clone(),
            self.strava.refresh_token.clone(),
        ) {
            let adapter = StravaAdapter::new(
                transport.clone(),
                StravaCredentials {
                    client_id,
                    client_secret,
                    refresh_token,
                    session_cookie: self.strava.session_cookie.clone(),
                },
            );
            register(&mut registry, adapter, Platform::Strava, pace);
        }

        if let (Some(username), Some(password)) =
            (self.garmin.username.clone(), self.garmin.password.clone())
        {
            let adapter = GarminAdapter::international(
                transport.clone(),
                GarminCredentials {
                    username,
                    password,
                    session_token: self.garmin.session_token.clone(),
                },
            );
            register(&mut registry, adapter, Platform::Garmin, pace);
        }

        if let (Some(username), Some(password)) = (
            self.garmin_cn.username.clone(),
            self.garmin_cn.password.clone(),
        ) {
            let adapter = GarminAdapter::china(
                transport.clone(),
                GarminCredentials {
                    username,
                    password,
                    session_token: self.garmin_cn.session_token.clone(),
                },
            );
            register(&mut registry, adapter, Platform::GarminCn, pace);
        }

        if let (Some(username), Some(password)) = (
            self.igpsport.username.clone(),
            self.igpsport.password.clone(),
        ) {
            let adapter = IgpsportAdapter::new(
                transport.clone(),
                IgpsportCredentials { username, password },
            );
            register(&mut registry, adapter, Platform::Igpsport, pace);
        }

        if let (Some(client_id), Some(refresh_token)) = (
            self.onedrive.client_id.clone(),
            self.onedrive.refresh_token.clone(),
        ) {
            let adapter = OnedriveAdapter::new(
                transport.clone(),
                OnedriveCredentials {
                    client_id,
                    refresh_token,
                },
            );
            register(&mut registry, adapter, Platform::Onedrive, pace);
        }

        if let (Some(athlete_id), Some(api_key)) = (
            self.intervals_icu.athlete_id.clone(),
            self.intervals_icu.api_key.clone(),
        ) {
            let adapter = IntervalsIcuAdapter::new(
                transport.clone(),
                IntervalsIcuCredentials { athlete_id, api_key },
            );
            register(&mut registry, adapter, Platform::IntervalsIcu, pace);
        }

        Ok(registry)
    }
}

fn register<A: fitsync::platform::PlatformAdapter + 'static>(
    registry: &mut AdapterRegistry,
    adapter: A,
    platform: Platform,
    pace: bool,
) {
    if pace {
        registry.register(Arc::new(RateLimitedAdapter::new(
            adapter,
            default_rps_for_platform(platform),
        )));
    } else {
        registry.register(Arc::new(adapter));
    }
}

/// Session fields per platform, used by `--clear-session`.
fn session_fields(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Strava => &["session_cookie"],
        Platform::Garmin | Platform::GarminCn => &["session_token"],
        // The remaining platforms keep no session state outside their
        // persistent credentials.
        _ => &[],
    }
}

/// Remove a platform's session fields from the config file on disk.
///
/// Returns whether anything was removed.
pub fn clear_session(config_path: &Path, platform: Platform) -> Result<bool, String> {
    let fields = session_fields(platform);
    if fields.is_empty() {
        return Ok(false);
    }

    let contents = std::fs::read_to_string(config_path)
        .map_err(|e| format!("cannot read {}: {e}", config_path.display()))?;
    let mut root: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| format!("cannot parse {}: {e}", config_path.display()))?;

    let mut removed = false;
    if let Some(section) = root
        .get_mut(platform.as_str())
        .and_then(|v| v.as_object_mut())
    {
        for field in fields {
            removed |= section.remove(*field).is_some();
        }
    }

    if removed {
        let pretty = serde_json::to_string_pretty(&root)
            .map_err(|e| format!("cannot serialize config: {e}"))?;
        std::fs::write(config_path, pretty)
            .map_err(|e| format!("cannot write {}: {e}", config_path.display()))?;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.database_url(), "sqlite://sync_database.db?mode=rwc");
        assert_eq!(config.cache_dir(), PathBuf::from("activity_cache"));
        assert_eq!(config.sync.batch_size, 10);
    }

    #[test]
    fn unconfigured_platforms_are_absent_from_the_registry() {
        let config = AppConfig::default();
        let registry = config.build_registry().unwrap();
        assert!(registry.platforms().is_empty());
    }

    #[test]
    fn clear_session_strips_only_session_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{"strava": {"client_id": "1", "session_cookie": "c"}, "garmin": {"session_token": "t"}}"#,
        )
        .unwrap();

        assert!(clear_session(&path, Platform::Strava).unwrap());
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["strava"]["client_id"], "1");
        assert!(value["strava"].get("session_cookie").is_none());
        assert_eq!(value["garmin"]["session_token"], "t");

        // Platforms without session state are a no-op.
        assert!(!clear_session(&path, Platform::Onedrive).unwrap());
    }
}
