//! TOML configuration file loading
//!
//! Supports `~/.config/lora-relay/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfigFile {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Storage configuration
    #[serde(default)]
    pub database: DatabaseFileConfig,

    /// Heartbeat timeout configuration
    #[serde(default)]
    pub liveness: LivenessFileConfig,

    /// Mailbox configuration
    #[serde(default)]
    pub relay: RelayFileConfig,
}

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Bearer key guarding the admin API
    pub api_key: Option<String>,
}

/// Storage configuration
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseFileConfig {
    /// `SQLite` database file
    pub path: Option<String>,
}

/// Heartbeat timeout configuration
#[derive(Debug, Default, Deserialize)]
pub struct LivenessFileConfig {
    /// Seconds without a heartbeat before an ONLINE node is marked OFFLINE (0 disables)
    pub heartbeat_timeout_secs: Option<u64>,

    /// Seconds between sweeps
    pub sweep_interval_secs: Option<u64>,
}

/// Mailbox configuration
#[derive(Debug, Default, Deserialize)]
pub struct RelayFileConfig {
    /// Maximum messages returned by an inbox query
    pub inbox_limit: Option<usize>,
}

/// Load the TOML config file from the standard path
///
/// Returns `RelayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> RelayConfigFile {
    config_file_path().map_or_else(RelayConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> RelayConfigFile {
    if !path.exists() {
        return RelayConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                RelayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            RelayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/lora-relay/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("lora-relay").join("config.toml"))
}
