//! Uploader configuration.
//!
//! Settings live in `<config dir>/chunkwise/config.json`. Every field is
//! optional in the file; secrets can be supplied through the environment
//! instead:
//!
//! - `CHUNKWISE_ACCESS_TOKEN_ID`
//! - `CHUNKWISE_SECRET_KEY`
//! - `CHUNKWISE_ENDPOINT`

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chunkwise_authorization::Credentials;
use chunkwise_connectivity::ProbeConfig;
use chunkwise_protocol::MediaPolicy;
use chunkwise_protocol::constants::{
    DEFAULT_CHUNK_SIZE_MB, DEFAULT_INGESTION_ENDPOINT, MAX_CHUNK_SIZE_MB, MIN_CHUNK_SIZE_MB,
    PROBE_INTERVAL, PROBE_TIMEOUT,
};
use chunkwise_transfer::{ChunkSizePolicy, ChunkSizeRequest};

pub const ENV_ACCESS_TOKEN_ID: &str = "CHUNKWISE_ACCESS_TOKEN_ID";
pub const ENV_SECRET_KEY: &str = "CHUNKWISE_SECRET_KEY";
pub const ENV_ENDPOINT: &str = "CHUNKWISE_ENDPOINT";

/// Errors from loading or saving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything needed to build an uploader.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderSettings {
    /// Ingestion endpoint that hands out upload addresses.
    pub endpoint: String,
    pub access_token_id: String,
    pub secret_key: String,
    pub media_policy: MediaPolicy,
    /// Requested chunk size in MB; invalid values fall back to the default.
    pub chunk_size_mb: i64,
    pub min_chunk_size_mb: u64,
    pub max_chunk_size_mb: u64,
    pub default_chunk_size_mb: u64,
    /// URL probed with `HEAD` to decide whether the network is reachable.
    pub probe_url: String,
    pub probe_interval_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for UploaderSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_INGESTION_ENDPOINT.to_string(),
            access_token_id: String::new(),
            secret_key: String::new(),
            media_policy: MediaPolicy::default(),
            chunk_size_mb: DEFAULT_CHUNK_SIZE_MB as i64,
            min_chunk_size_mb: MIN_CHUNK_SIZE_MB,
            max_chunk_size_mb: MAX_CHUNK_SIZE_MB,
            default_chunk_size_mb: DEFAULT_CHUNK_SIZE_MB,
            probe_url: DEFAULT_INGESTION_ENDPOINT.to_string(),
            probe_interval_secs: PROBE_INTERVAL.as_secs(),
            probe_timeout_secs: PROBE_TIMEOUT.as_secs(),
        }
    }
}

impl fmt::Debug for UploaderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderSettings")
            .field("endpoint", &self.endpoint)
            .field("access_token_id", &self.access_token_id)
            .field("secret_key", &"<redacted>")
            .field("media_policy", &self.media_policy)
            .field("chunk_size_mb", &self.chunk_size_mb)
            .field("probe_url", &self.probe_url)
            .finish_non_exhaustive()
    }
}

impl UploaderSettings {
    /// Loads settings from the default path and applies environment overrides.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_from(&default_path())?;
        settings.apply_env();
        Ok(settings)
    }

    /// Loads settings from `path`.
    ///
    /// A missing file yields defaults. An unparsable file is logged and also
    /// yields defaults; other I/O errors are returned.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse settings, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Saves settings to the default path.
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&default_path())
    }

    /// Writes settings as pretty JSON, readable only by the owner on unix.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        if let Err(e) = set_permissions_0600(path) {
            tracing::warn!(path = %path.display(), error = %e, "could not restrict settings file permissions");
        }

        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ACCESS_TOKEN_ID) {
            self.access_token_id = v;
        }
        if let Some(v) = get(ENV_SECRET_KEY) {
            self.secret_key = v;
        }
        if let Some(v) = get(ENV_ENDPOINT) {
            tracing::debug!(endpoint = %v, "endpoint overridden from environment");
            self.endpoint = v;
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.access_token_id.clone(), self.secret_key.clone())
    }

    pub fn chunk_size_policy(&self) -> ChunkSizePolicy {
        ChunkSizePolicy::from_megabytes(
            self.min_chunk_size_mb,
            self.max_chunk_size_mb,
            self.default_chunk_size_mb,
        )
    }

    pub fn chunk_size_request(&self) -> ChunkSizeRequest {
        ChunkSizeRequest::Megabytes(self.chunk_size_mb)
    }

    pub fn media_policy(&self) -> MediaPolicy {
        self.media_policy.clone()
    }

    /// Probe settings; zero durations fall back to the defaults.
    pub fn probe_config(&self) -> ProbeConfig {
        let secs_or = |secs: u64, default: Duration| {
            if secs == 0 {
                default
            } else {
                Duration::from_secs(secs)
            }
        };
        ProbeConfig {
            url: self.probe_url.clone(),
            interval: secs_or(self.probe_interval_secs, PROBE_INTERVAL),
            timeout: secs_or(self.probe_timeout_secs, PROBE_TIMEOUT),
        }
    }
}

/// `<config dir>/chunkwise/config.json`.
pub fn default_path() -> PathBuf {
    config_base_dir().join("chunkwise").join("config.json")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            return PathBuf::from(xdg);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }

    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join("Library").join("Application Support")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        PathBuf::from("/tmp")
    }
}

fn set_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
