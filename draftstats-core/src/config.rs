//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "dataSource": { "mode": "hybrid", "enabled": true, "primary": "remote" },
//!   "api": { "baseUrl": "http://localhost:8000/api", "timeoutSecs": 30, "retryAttempts": 3 },
//!   "distributed": { "connectionString": "postgres://...", "queryTimeoutSecs": 30 },
//!   "database": { "file": "draftstats.duckdb" }
//! }
//! ```
//! Every field is optional. Mode, the feature flag, the API URL and the
//! distributed connection string can be overridden from the environment.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::retry::RetryPolicy;

pub const MODE_ENV: &str = "DRAFTSTATS_MODE";
pub const API_ENABLED_ENV: &str = "DRAFTSTATS_API_ENABLED";
pub const API_URL_ENV: &str = "DRAFTSTATS_API_URL";
pub const DISTRIBUTED_URL_ENV: &str = "DRAFTSTATS_DISTRIBUTED_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_DATABASE_FILE: &str = "draftstats.duckdb";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Which adapters the orchestrator holds and how it falls back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSourceMode {
    /// Remote or distributed store only, errors surface directly
    PrimaryOnly,
    /// Embedded store only, for offline use
    SecondaryOnly,
    /// Primary first, embedded store on any primary error
    #[default]
    Hybrid,
}

impl FromStr for DataSourceMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "primary-only" | "primary" => Ok(Self::PrimaryOnly),
            "secondary-only" | "secondary" | "local" => Ok(Self::SecondaryOnly),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::config(format!(
                "unsupported data source mode '{}' (expected primary-only, secondary-only or hybrid)",
                other
            ))),
        }
    }
}

impl fmt::Display for DataSourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrimaryOnly => "primary-only",
            Self::SecondaryOnly => "secondary-only",
            Self::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Backend used as the primary adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimaryBackend {
    /// HTTP analytics service
    #[default]
    Remote,
    /// Read-only PostgreSQL replica
    Distributed,
}

impl FromStr for PrimaryBackend {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remote" | "api" => Ok(Self::Remote),
            "distributed" | "postgres" | "postgresql" => Ok(Self::Distributed),
            other => Err(Error::config(format!("unknown primary backend '{}'", other))),
        }
    }
}

impl fmt::Display for PrimaryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Distributed => "distributed",
        })
    }
}

/// Remote analytics API settings
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::remote(),
        }
    }
}

/// Distributed store settings, handed to the adapter at construction
#[derive(Debug, Clone, PartialEq)]
pub struct DistributedConfig {
    pub connection_string: Option<String>,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            query_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::distributed(),
        }
    }
}

// Raw settings.json structure

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    data_source: DataSourceSettings,
    #[serde(default)]
    api: ApiSettings,
    #[serde(default)]
    distributed: DistributedSettings,
    #[serde(default)]
    database: DatabaseSettings,
    /// Sections this crate does not manage, preserved on save
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSourceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DistributedSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connect_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: DataSourceMode,
    /// Feature flag for the primary backend; off means no primary is built
    pub api_enabled: bool,
    pub primary: PrimaryBackend,
    pub api: ApiConfig,
    pub distributed: DistributedConfig,
    pub database_file: String,
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: DataSourceMode::default(),
            api_enabled: true,
            primary: PrimaryBackend::default(),
            api: ApiConfig::default(),
            distributed: DistributedConfig::default(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" | "TRUE" | "YES" => Some(true),
        "false" | "0" | "no" | "FALSE" | "NO" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load config from the data directory, applying environment overrides
    pub fn load(data_dir: &Path) -> Result<Self> {
        Self::load_with_env(data_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an explicit environment lookup
    pub fn load_with_env(data_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings file {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        let defaults = Config::default();

        let mode = match env(MODE_ENV).or_else(|| raw.data_source.mode.clone()) {
            Some(mode) => mode.parse()?,
            None => defaults.mode,
        };

        let api_enabled = env(API_ENABLED_ENV)
            .as_deref()
            .and_then(parse_flag)
            .or(raw.data_source.enabled)
            .unwrap_or(defaults.api_enabled);

        let primary = match &raw.data_source.primary {
            Some(primary) => primary.parse()?,
            None => defaults.primary,
        };

        let mut api = defaults.api;
        if let Some(url) = env(API_URL_ENV).or_else(|| raw.api.base_url.clone()) {
            api.base_url = url;
        }
        if let Some(secs) = raw.api.timeout_secs {
            api.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = raw.api.retry_attempts {
            api.retry = api.retry.with_max_attempts(attempts);
        }
        if let Some(ms) = raw.api.retry_backoff_ms {
            api.retry.initial_delay = Duration::from_millis(ms);
        }

        let mut distributed = defaults.distributed;
        distributed.connection_string = env(DISTRIBUTED_URL_ENV)
            .or_else(|| raw.distributed.connection_string.clone())
            .filter(|s| !s.trim().is_empty());
        if let Some(secs) = raw.distributed.connect_timeout_secs {
            distributed.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = raw.distributed.query_timeout_secs {
            distributed.query_timeout = Duration::from_secs(secs);
        }

        Ok(Self {
            mode,
            api_enabled,
            primary,
            api,
            distributed,
            database_file: raw
                .database
                .file
                .clone()
                .unwrap_or(defaults.database_file),
            _raw_settings: raw,
        })
    }

    /// Save to the data directory, preserving sections we don't manage
    ///
    /// The distributed connection string is left as found on disk, so a value
    /// supplied through the environment is never persisted.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.data_source.mode = Some(self.mode.to_string());
        settings.data_source.enabled = Some(self.api_enabled);
        settings.data_source.primary = Some(self.primary.to_string());
        settings.api.base_url = Some(self.api.base_url.clone());
        settings.api.timeout_secs = Some(self.api.timeout.as_secs());
        settings.api.retry_attempts = Some(self.api.retry.max_attempts);
        settings.database.file = Some(self.database_file.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Embedded store path inside the data directory
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_with_env(dir.path(), no_env).unwrap();

        assert_eq!(config.mode, DataSourceMode::Hybrid);
        assert!(config.api_enabled);
        assert_eq!(config.primary, PrimaryBackend::Remote);
        assert_eq!(config.api.timeout, Duration::from_secs(30));
        assert_eq!(config.api.retry.max_attempts, 3);
        assert!(config.distributed.connection_string.is_none());
        assert_eq!(
            config.database_path(dir.path()),
            dir.path().join("draftstats.duckdb")
        );
    }

    #[test]
    fn test_settings_file_values() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{
                "dataSource": { "mode": "primary_only", "enabled": true, "primary": "distributed" },
                "api": { "baseUrl": "http://stats.local/api", "timeoutSecs": 5, "retryAttempts": 6 },
                "distributed": { "connectionString": "host=db user=reader", "queryTimeoutSecs": 7 },
                "database": { "file": "local.duckdb" }
            }"#,
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(config.mode, DataSourceMode::PrimaryOnly);
        assert_eq!(config.primary, PrimaryBackend::Distributed);
        assert_eq!(config.api.base_url, "http://stats.local/api");
        assert_eq!(config.api.timeout, Duration::from_secs(5));
        assert_eq!(config.api.retry.max_attempts, 6);
        assert_eq!(
            config.distributed.connection_string.as_deref(),
            Some("host=db user=reader")
        );
        assert_eq!(config.distributed.query_timeout, Duration::from_secs(7));
        assert_eq!(config.database_file, "local.duckdb");
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "dataSource": { "mode": "hybrid", "enabled": true } }"#,
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), |key| match key {
            MODE_ENV => Some("secondary-only".to_string()),
            API_ENABLED_ENV => Some("no".to_string()),
            API_URL_ENV => Some("http://override/api".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.mode, DataSourceMode::SecondaryOnly);
        assert!(!config.api_enabled);
        assert_eq!(config.api.base_url, "http://override/api");
    }

    #[test]
    fn test_unsupported_mode_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_with_env(dir.path(), |key| {
            (key == MODE_ENV).then(|| "sometimes".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("unsupported data source mode"));
    }

    #[test]
    fn test_blank_connection_string_counts_as_missing() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_with_env(dir.path(), |key| {
            (key == DISTRIBUTED_URL_ENV).then(|| "   ".to_string())
        })
        .unwrap();
        assert!(config.distributed.connection_string.is_none());
    }

    #[test]
    fn test_save_preserves_unmanaged_sections() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "ui": { "theme": "dark" }, "distributed": { "connectionString": "secret" } }"#,
        )
        .unwrap();

        let mut config = Config::load_with_env(dir.path(), no_env).unwrap();
        config.mode = DataSourceMode::SecondaryOnly;
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["ui"]["theme"], "dark");
        assert_eq!(value["dataSource"]["mode"], "secondary-only");
        assert_eq!(value["distributed"]["connectionString"], "secret");

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(reloaded.mode, DataSourceMode::SecondaryOnly);
    }

    #[test]
    fn test_mode_parsing_accepts_both_spellings() {
        assert_eq!(
            "primary-only".parse::<DataSourceMode>().unwrap(),
            DataSourceMode::PrimaryOnly
        );
        assert_eq!(
            "SECONDARY_ONLY".parse::<DataSourceMode>().unwrap(),
            DataSourceMode::SecondaryOnly
        );
        assert!(matches!(
            "offline-ish".parse::<DataSourceMode>(),
            Err(Error::Config(_))
        ));
    }
}
