// ABOUTME: TOML configuration for keychain tools, pairing, and the credential store.
// ABOUTME: Every section has defaults so a missing file yields a working setup.

use crate::error::{KeychainError, Result};
use keychain_ssh::SshTools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level keychain configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: SshTools,
    pub store: StoreConfig,
    pub pairing: PairingConfig,
}

/// Where the SQLite credential store lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database path. Defaults to `keychain.db` in the config directory.
    pub path: Option<PathBuf>,
}

/// Knobs for both sides of the pairing handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Hostname sent to the remote; it only labels the returned host keys.
    pub placeholder_hostname: String,
    /// Path segment appended to the node URL to reach the control channel.
    pub channel_path: String,
    /// Remote operation that performs the pairing.
    pub pair_operation: String,
    pub host_key_poll_attempts: u32,
    pub host_key_poll_interval_ms: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            placeholder_hostname: "any-host".to_string(),
            channel_path: "websocket".to_string(),
            pair_operation: "replication.pair".to_string(),
            host_key_poll_attempts: 5,
            host_key_poll_interval_ms: 1000,
        }
    }
}

impl PairingConfig {
    pub fn host_key_poll_interval(&self) -> Duration {
        Duration::from_millis(self.host_key_poll_interval_ms)
    }
}

impl Config {
    /// Returns the config directory path (~/.config/keychain)
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .map(|d| d.join("keychain"))
            .ok_or_else(|| KeychainError::Config("could not determine config directory".into()))
    }

    /// Returns the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load from the default location, falling back to defaults if absent.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            KeychainError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            KeychainError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| KeychainError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| KeychainError::Config(format!("failed to serialize config: {e}")))?;
        fs::write(path, contents).map_err(|e| KeychainError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolved store path.
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("keychain.db")),
        }
    }
}
