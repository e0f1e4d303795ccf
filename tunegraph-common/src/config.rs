//! Configuration loading and resolution
//!
//! Resolution priority (highest first):
//! 1. Command-line argument / environment variable (applied via [`ConfigOverrides`])
//! 2. TOML config file
//! 3. Compiled defaults
//!
//! A missing default config file is not an error: the service starts on
//! compiled defaults. An explicitly requested file that is missing is.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default HTTP port for the recommendation service
pub const DEFAULT_PORT: u16 = 8004;

/// Default cap for each recommendation list
pub const DEFAULT_RECOMMENDATION_LIMIT: u32 = 20;

/// Default discover threshold (songs with at most this many ratings qualify)
pub const DEFAULT_DISCOVER_MAX_RATINGS: u32 = 5;

/// Recommendation query settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecommendationSettings {
    /// Maximum songs returned per list
    pub limit: u32,
    /// Maximum total ratings a song may carry to appear in the discover list
    pub discover_max_ratings: u32,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RECOMMENDATION_LIMIT,
            discover_max_ratings: DEFAULT_DISCOVER_MAX_RATINGS,
        }
    }
}

/// Graph sync settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Deadline for a single sync phase in seconds
    pub phase_timeout_secs: u64,
    /// Interval between unconditional full resyncs (0 disables)
    pub resync_interval_secs: u64,
    /// Trigger one refresh as soon as the service starts
    pub sync_on_startup: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            phase_timeout_secs: 60,
            resync_interval_secs: 300,
            sync_on_startup: true,
        }
    }
}

impl SyncSettings {
    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }

    /// Periodic resync interval, `None` when disabled
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }
}

/// Store connection retry settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectSettings {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            retry_delay_ms: 2000,
        }
    }
}

impl ConnectSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_host: String,
    pub port: u16,
    /// Source-of-truth catalog database (opened read-only)
    pub source_db: PathBuf,
    /// Graph database (created if missing)
    pub graph_db: PathBuf,
    /// Key required in `X-Service-API-Key` for internal routes; `None` disables the check
    pub service_api_key: Option<String>,
    pub recommendations: RecommendationSettings,
    pub sync: SyncSettings,
    pub connect: ConnectSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            source_db: data_dir.join("content.db"),
            graph_db: data_dir.join("graph.db"),
            service_api_key: None,
            recommendations: RecommendationSettings::default(),
            sync: SyncSettings::default(),
            connect: ConnectSettings::default(),
        }
    }
}

/// On-disk TOML layout; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_host: Option<String>,
    pub port: Option<u16>,
    pub source_db: Option<PathBuf>,
    pub graph_db: Option<PathBuf>,
    pub service_api_key: Option<String>,
    pub recommendations: Option<RecommendationSettings>,
    pub sync: Option<SyncSettings>,
    pub connect: Option<ConnectSettings>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub bind_host: Option<String>,
    pub port: Option<u16>,
    pub source_db: Option<PathBuf>,
    pub graph_db: Option<PathBuf>,
    pub service_api_key: Option<String>,
}

impl ServiceConfig {
    /// Resolve configuration from an optional explicit file, the default
    /// config location, and compiled defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let toml_config = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Some(Self::read_toml(path)?)
            }
            None => match default_config_file() {
                Some(path) if path.exists() => Some(Self::read_toml(&path)?),
                _ => {
                    info!("No config file found, using compiled defaults");
                    None
                }
            },
        };

        let mut config = Self::default();
        if let Some(file) = toml_config {
            config.merge_toml(file);
        }
        Ok(config)
    }

    /// Parse a TOML config string (used by `load` and tests)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfig = toml::from_str(content)?;
        let mut config = Self::default();
        config.merge_toml(file);
        Ok(config)
    }

    fn read_toml(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)?;
        info!("Loaded config file: {}", path.display());
        Ok(toml::from_str(&content)?)
    }

    fn merge_toml(&mut self, file: TomlConfig) {
        if let Some(host) = file.bind_host {
            self.bind_host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(path) = file.source_db {
            self.source_db = path;
        }
        if let Some(path) = file.graph_db {
            self.graph_db = path;
        }
        if file.service_api_key.is_some() {
            self.service_api_key = file.service_api_key;
        }
        if let Some(recommendations) = file.recommendations {
            self.recommendations = recommendations;
        }
        if let Some(sync) = file.sync {
            self.sync = sync;
        }
        if let Some(connect) = file.connect {
            self.connect = connect;
        }
    }

    /// Apply command-line / environment overrides (highest priority)
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.bind_host {
            self.bind_host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(path) = overrides.source_db {
            self.source_db = path;
        }
        if let Some(path) = overrides.graph_db {
            self.graph_db = path;
        }
        if overrides.service_api_key.is_some() {
            self.service_api_key = overrides.service_api_key;
        }
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.recommendations.limit == 0 {
            return Err(Error::Config("recommendations.limit must be at least 1".to_string()));
        }
        if self.sync.phase_timeout_secs == 0 {
            return Err(Error::Config("sync.phase_timeout_secs must be at least 1".to_string()));
        }
        if self.connect.max_attempts == 0 {
            return Err(Error::Config("connect.max_attempts must be at least 1".to_string()));
        }
        if matches!(self.service_api_key.as_deref(), Some(key) if key.trim().is_empty()) {
            return Err(Error::Config(
                "service_api_key must not be blank; omit it to disable the guard".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

/// `~/.config/tunegraph/config.toml` (platform equivalent elsewhere)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tunegraph").join("config.toml"))
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tunegraph"))
        .unwrap_or_else(|| PathBuf::from("./tunegraph_data"))
}
