use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::trace;

use crate::monitors::thresholds::ThresholdSet;

/// Errors found while loading or checking a configuration file
#[derive(Debug)]
pub enum ConfigError {
    /// File could not be read
    Io(std::io::Error),

    /// File content is not valid JSON/TOML for the expected shape
    Parse(String),

    /// A required field is missing or out of range
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "failed to read configuration: {}", err),
            ConfigError::Parse(msg) => write!(f, "invalid configuration file: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

// ============================================================================
// Collector
// ============================================================================

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CollectorConfig {
    pub endpoint: EndpointConfig,

    /// Seconds between the start of two collection cycles
    pub interval_seconds: u64,

    pub thresholds: ThresholdSet,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub metrics: MetricsOptions,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EndpointConfig {
    pub url: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds to wait between failed attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Bearer token for an ingestion service that requires one
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,

    #[serde(default = "default_channels")]
    pub channels: Vec<String>,

    pub slack_webhook_url: Option<String>,

    pub webhook_url: Option<String>,

    #[serde(default)]
    pub webhook_headers: HashMap<String, String>,

    pub email: Option<EmailConfig>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_minutes: default_cooldown_minutes(),
            channels: default_channels(),
            slack_webhook_url: None,
            webhook_url: None,
            webhook_headers: HashMap::new(),
            email: None,
        }
    }
}

impl AlertsConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    /// Defaults to `username`
    pub from_address: Option<String>,
    pub to_addresses: Vec<String>,
    #[serde(default = "default_true")]
    pub use_tls: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MetricsOptions {
    #[serde(default = "default_true")]
    pub include_network: bool,

    #[serde(default)]
    pub include_processes: bool,

    #[serde(default = "default_top_process_count")]
    pub top_process_count: usize,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            include_network: true,
            include_processes: false,
            top_process_count: default_top_process_count(),
        }
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Check the fields serde cannot express as required
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.url.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint.url must not be empty".into()));
        }
        if self.interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "interval_seconds must be greater than 0".into(),
            ));
        }
        if self.endpoint.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "endpoint.max_retries must be at least 1".into(),
            ));
        }
        if self.endpoint.timeout == 0 {
            return Err(ConfigError::Invalid(
                "endpoint.timeout must be greater than 0".into(),
            ));
        }

        for channel in &self.alerts.channels {
            match channel.as_str() {
                "log" => {}
                "slack" if self.alerts.slack_webhook_url.is_none() => {
                    return Err(ConfigError::Invalid(
                        "alerts.slack_webhook_url is required for the slack channel".into(),
                    ));
                }
                "webhook" if self.alerts.webhook_url.is_none() => {
                    return Err(ConfigError::Invalid(
                        "alerts.webhook_url is required for the webhook channel".into(),
                    ));
                }
                "email" if self.alerts.email.is_none() => {
                    return Err(ConfigError::Invalid(
                        "alerts.email is required for the email channel".into(),
                    ));
                }
                "slack" | "webhook" | "email" => {}
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "unknown alert channel '{other}'"
                    )));
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Ingestion service
// ============================================================================

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None {
        #[serde(default = "default_retention_days")]
        retention_days: u32,
    },

    /// SQLite database
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Rows ingested longer ago than this are deleted by the retention sweep
        #[serde(default = "default_retention_days")]
        retention_days: u32,

        #[serde(default = "default_cleanup_interval_hours")]
        cleanup_interval_hours: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            retention_days: default_retention_days(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
        }
    }
}

impl StorageConfig {
    pub fn retention_days(&self) -> u32 {
        match self {
            StorageConfig::None { retention_days } => *retention_days,
            StorageConfig::Sqlite { retention_days, .. } => *retention_days,
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        let hours = match self {
            StorageConfig::None { .. } => default_cleanup_interval_hours(),
            StorageConfig::Sqlite {
                cleanup_interval_hours,
                ..
            } => *cleanup_interval_hours,
        };
        Duration::from_secs(u64::from(hours.max(1)) * 3600)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_bind_host")]
    pub host: IpAddr,

    #[serde(default = "crate::util::get_default_port")]
    pub port: u16,

    /// Bearer token required on every route except `/health`
    pub auth_token: Option<String>,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: crate::util::get_default_port(),
            auth_token: None,
            enable_cors: true,
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

// ============================================================================
// Defaults and loading
// ============================================================================

fn default_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_cooldown_minutes() -> u64 {
    5
}

fn default_channels() -> Vec<String> {
    vec!["log".to_string()]
}

fn default_top_process_count() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./metrics.db")
}

fn default_retention_days() -> u32 {
    30
}

fn default_cleanup_interval_hours() -> u32 {
    24
}

fn default_bind_host() -> IpAddr {
    IpAddr::from(crate::util::DEFAULT_ADDR)
}

/// Parse a config file as TOML when it has a `.toml` extension, JSON otherwise
fn parse_config<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T, ConfigError> {
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    } else {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

pub fn read_collector_config(path: impl AsRef<Path>) -> Result<CollectorConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config: CollectorConfig = parse_config(path, &content)?;
    config.validate()?;
    trace!("loaded collector config: {config:?}");
    Ok(config)
}

pub fn read_ingest_config(path: impl AsRef<Path>) -> Result<IngestConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config: IngestConfig = parse_config(path, &content)?;
    trace!("loaded ingest config: {config:?}");
    Ok(config)
}
