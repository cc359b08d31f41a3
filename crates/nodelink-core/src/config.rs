//! Configuration for nodelink.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $NODELINK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/nodelink/config.toml
//!   3. ~/.config/nodelink/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::endpoint::{build_catalog, EndpointConfig};

/// Top-level configuration: the peer list plus link tunables.
///
/// All periods and timeouts are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodelinkConfig {
    /// Peer nodes as `"host:port"` strings.
    pub peers: Vec<String>,
    /// Read/write idle time after which a link is treated as dead.
    pub idle_timeout_ms: u64,
    pub heartbeat_period_ms: u64,
    pub reconnect_period_ms: u64,
    pub connect_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodelinkConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            idle_timeout_ms: 10_000,
            heartbeat_period_ms: 2_000,
            reconnect_period_ms: 20_000,
            connect_timeout_ms: 10_000,
            handshake_timeout_ms: 10_000,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("nodelink")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no peer nodes configured, check the \"peers\" field")]
    EmptyCatalog,
    #[error("invalid peer entry {0:?}, expected IP:port (eg: 127.0.0.1:20200)")]
    MalformedEntry(String),
    #[error("invalid peer entry {entry:?}: {host:?} is not an IPv4 address")]
    InvalidHost { entry: String, host: String },
    #[error("invalid peer entry {entry:?}: port {port:?} is not in 1..=65535")]
    InvalidPort { entry: String, port: String },
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl NodelinkConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific file, falling back to defaults if it doesn't exist.
    /// No env overrides are applied.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("NODELINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&NodelinkConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Validate the peer list into an endpoint catalog.
    pub fn catalog(&self) -> Result<Vec<EndpointConfig>, ConfigError> {
        build_catalog(&self.peers)
    }

    /// Apply NODELINK_* overrides. `lookup` is `std::env::var` in production.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("NODELINK_PEERS") {
            self.peers = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        let numeric = [
            ("NODELINK_IDLE_TIMEOUT_MS", &mut self.idle_timeout_ms),
            ("NODELINK_HEARTBEAT_PERIOD_MS", &mut self.heartbeat_period_ms),
            ("NODELINK_RECONNECT_PERIOD_MS", &mut self.reconnect_period_ms),
            ("NODELINK_CONNECT_TIMEOUT_MS", &mut self.connect_timeout_ms),
            ("NODELINK_HANDSHAKE_TIMEOUT_MS", &mut self.handshake_timeout_ms),
        ];
        for (key, slot) in numeric {
            if let Some(v) = lookup(key) {
                match v.parse() {
                    Ok(ms) => *slot = ms,
                    Err(_) => tracing::warn!(key, value = %v, "ignoring non-numeric override"),
                }
            }
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms)
    }

    pub fn reconnect_period(&self) -> Duration {
        Duration::from_millis(self.reconnect_period_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
