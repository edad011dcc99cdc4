//! Service configuration.
//!
//! Layered: built-in defaults → optional TOML file (path from the
//! `EVENTDB_CONFIG` environment variable) → environment overrides for the
//! connection settings. Durations are plain seconds in the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_UPSTREAM_HOST: &str = "localhost:9080";
const DEFAULT_REST_PORT: u16 = 9111;
const MYSQL_PORT: u16 = 3306;
const POSTGRES_PORT: u16 = 5432;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "EVENTDB_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub upstream: UpstreamConfig,
    pub retention: RetentionConfig,
    pub period: PeriodConfig,
    pub rest: RestConfig,
}

/// Which transactional SQL backend to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    MySql,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub driver: Driver,
    pub host: String,
    /// Defaults to the driver's well-known port when unset.
    pub port: Option<u16>,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: Driver::MySql,
            host: "localhost".to_string(),
            port: None,
            name: "events".to_string(),
            user: "root".to_string(),
            password: String::new(),
        }
    }
}

impl StorageConfig {
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(match self.driver {
            Driver::MySql => MYSQL_PORT,
            Driver::Postgres => POSTGRES_PORT,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base authority (`host:port`) of the scheduler.
    pub host: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_UPSTREAM_HOST.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Rows older than this are deleted by the expiry sweeper.
    #[serde(with = "duration_secs")]
    pub row_age: Duration,
    /// Completed applications stay cached for this long.
    #[serde(with = "duration_secs")]
    pub completed_app_age: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            row_age: Duration::from_secs(24 * 60 * 60),
            completed_app_age: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodConfig {
    /// Writer cycle period.
    #[serde(with = "duration_secs")]
    pub fetch: Duration,
    /// Store row expiry period.
    #[serde(with = "duration_secs")]
    pub expiry_sweep: Duration,
    /// Cache eviction scan period.
    #[serde(with = "duration_secs")]
    pub cache_sweep: Duration,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(1),
            expiry_sweep: Duration::from_secs(60 * 60),
            cache_sweep: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Listening port of the query service.
    pub port: u16,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_REST_PORT,
        }
    }
}

impl Config {
    /// Load configuration from all sources: defaults, then the file named by
    /// `EVENTDB_CONFIG` (if any), then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML config file on top of the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Apply `EVENTDB_*` environment overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary environment lookup (testable form).
    pub fn apply_env_overrides_from<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = env("EVENTDB_UPSTREAM_HOST") {
            self.upstream.host = host;
        }
        if let Some(host) = env("EVENTDB_DB_HOST") {
            self.storage.host = host;
        }
        if let Some(name) = env("EVENTDB_DB_NAME") {
            self.storage.name = name;
        }
        if let Some(user) = env("EVENTDB_DB_USER") {
            self.storage.user = user;
        }
        if let Some(password) = env("EVENTDB_DB_PASSWORD") {
            self.storage.password = password;
        }
        if let Some(driver) = env("EVENTDB_DB_DRIVER") {
            match driver.to_lowercase().as_str() {
                "mysql" => self.storage.driver = Driver::MySql,
                "postgres" => self.storage.driver = Driver::Postgres,
                other => {
                    tracing::warn!(driver = %other, "unsupported EVENTDB_DB_DRIVER value, keeping configured driver");
                }
            }
        }
        if let Some(port) = env("EVENTDB_DB_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.storage.port = Some(port),
                Err(_) => {
                    tracing::warn!(value = %port, "illegal EVENTDB_DB_PORT value, keeping configured port");
                }
            }
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
