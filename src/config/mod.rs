//! Configuration management for the relay

pub mod file;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::db::DEFAULT_MAILBOX_LIMIT;
use crate::{Error, Result};

use self::file::RelayConfigFile;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Default heartbeat timeout in seconds
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 300;

/// Default liveness sweep interval in seconds
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Relay configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory
    pub data_dir: PathBuf,

    /// `SQLite` database file
    pub database_path: PathBuf,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Heartbeat timeout configuration
    pub liveness: LivenessConfig,

    /// Maximum messages returned by an inbox query
    pub inbox_limit: usize,
}

/// HTTP API server configuration
#[derive(Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// API key for admin endpoints (from `RELAY_API_KEY` env)
    pub api_key: Option<String>,
}

// Keep the admin key out of debug logs
impl fmt::Debug for ApiServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiServerConfig")
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Heartbeat timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessConfig {
    /// Seconds without a heartbeat before a node is marked OFFLINE; 0 disables
    pub heartbeat_timeout_secs: u64,

    /// Seconds between sweeps
    pub sweep_interval_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl LivenessConfig {
    /// Heartbeat timeout, or `None` when expiry is disabled
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.heartbeat_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.heartbeat_timeout_secs))
        }
    }

    /// Time between sweeps
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Return the data directory (`~/.local/share/lora-relay` on Linux)
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("lora-relay"))
}

/// Look up `key` and parse it, treating unparseable values as unset
fn parsed<T, F>(env: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    env(key).and_then(|s| s.parse().ok())
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range
    pub fn load() -> Result<Self> {
        // env > toml > default
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok(), default_data_dir())
    }

    /// Resolve configuration from a parsed config file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range
    pub fn from_sources<F>(fc: RelayConfigFile, env: F, data_dir: PathBuf) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_server = ApiServerConfig {
            port: parsed(&env, "RELAY_PORT")
                .or_else(|| parsed(&env, "PORT"))
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            api_key: env("RELAY_API_KEY")
                .or(fc.server.api_key)
                .filter(|k| !k.is_empty()),
        };

        let database_path = env("RELAY_DATABASE_PATH")
            .or(fc.database.path)
            .map_or_else(|| data_dir.join("relay.db"), PathBuf::from);

        let liveness = LivenessConfig {
            heartbeat_timeout_secs: parsed(&env, "RELAY_HEARTBEAT_TIMEOUT_SECS")
                .or(fc.liveness.heartbeat_timeout_secs)
                .unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT_SECS),
            sweep_interval_secs: parsed(&env, "RELAY_SWEEP_INTERVAL_SECS")
                .or(fc.liveness.sweep_interval_secs)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        };

        let inbox_limit = parsed(&env, "RELAY_INBOX_LIMIT")
            .or(fc.relay.inbox_limit)
            .unwrap_or(DEFAULT_MAILBOX_LIMIT);

        if inbox_limit == 0 {
            return Err(Error::Config("inbox limit must be at least 1".to_string()));
        }
        if liveness.timeout().is_some() && liveness.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "sweep interval must be at least 1 second".to_string(),
            ));
        }

        Ok(Self {
            data_dir,
            database_path,
            api_server,
            liveness,
            inbox_limit,
        })
    }
}
