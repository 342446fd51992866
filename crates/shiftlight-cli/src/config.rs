//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use shiftlight_core::{DEFAULT_BRIDGE_URL, DEFAULT_CONNECT_ATTEMPTS};

use crate::cli::ConfigKey;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the BLE bridge
    pub bridge_url: String,

    /// Seconds between status polls in watch mode
    pub poll_interval: u64,

    /// HTTP request timeout in seconds
    pub timeout: u64,

    /// Connection attempts requested from the bridge
    pub connect_attempts: u32,

    /// History database path (platform default when unset)
    pub database: Option<PathBuf>,

    /// Disable colored output
    pub no_color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            poll_interval: 3,
            timeout: 5,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            database: None,
            no_color: false,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shiftlight")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Parse `value` and store it under `key`.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        match key {
            ConfigKey::BridgeUrl => {
                if value.trim().is_empty() {
                    bail!("bridge_url must not be empty");
                }
                self.bridge_url = value.trim().to_string();
            }
            ConfigKey::PollInterval => {
                self.poll_interval = parse_positive(key, value)?;
            }
            ConfigKey::Timeout => {
                self.timeout = parse_positive(key, value)?;
            }
            ConfigKey::ConnectAttempts => {
                self.connect_attempts = u32::try_from(parse_positive(key, value)?)
                    .with_context(|| format!("{} is too large", key_name(key)))?;
            }
            ConfigKey::Database => {
                self.database = match value.trim() {
                    "" | "default" => None,
                    path => Some(PathBuf::from(path)),
                };
            }
            ConfigKey::NoColor => {
                self.no_color = value
                    .parse()
                    .with_context(|| format!("{} expects true or false", key_name(key)))?;
            }
        }
        Ok(())
    }

    /// HTTP timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn parse_positive(key: ConfigKey, value: &str) -> Result<u64> {
    let parsed: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{} expects a whole number, got '{}'", key_name(key), value))?;
    if parsed == 0 {
        bail!("{} must be greater than zero", key_name(key));
    }
    Ok(parsed)
}

/// Name of a key as it appears in the config file.
pub fn key_name(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::BridgeUrl => "bridge_url",
        ConfigKey::PollInterval => "poll_interval",
        ConfigKey::Timeout => "timeout",
        ConfigKey::ConnectAttempts => "connect_attempts",
        ConfigKey::Database => "database",
        ConfigKey::NoColor => "no_color",
    }
}

/// Resolve the bridge URL from the command line, then config.
pub fn resolve_bridge_url(arg: Option<&str>, config: &Config) -> String {
    arg.map(str::to_string)
        .unwrap_or_else(|| config.bridge_url.clone())
}

/// Resolve the database path from the command line, then config, then the platform default.
pub fn resolve_db_path(arg: Option<&Path>, config: &Config) -> PathBuf {
    arg.map(Path::to_path_buf)
        .or_else(|| config.database.clone())
        .unwrap_or_else(shiftlight_store::default_db_path)
}
