//! Configuration for the track-asset coordination core, using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: `%APPDATA%\tracklink-core\config.toml`
//! - macOS: `~/Library/Application Support/tracklink-core/config.toml`
//! - Linux: `~/.config/tracklink-core/config.toml`
//!
//! Every knob here is an external interface: the passive flag, retry/backoff
//! schedule, album-art LRU capacity, high-resolution-art flag, and the
//! scratch directory and queue sizing left as implementation parameters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default retry limit (valid range 1..=10).
pub const DEFAULT_RETRY_LIMIT: u8 = 3;
/// Backoff step between retries, per attempt.
pub const RETRY_BACKOFF_MS: u64 = 2000;
/// Backoff cap.
pub const MAX_RETRY_INTERVAL_MS: u64 = 6000;
/// Default album art LRU capacity.
pub const DEFAULT_LRU_CAPACITY: usize = 100;
/// Capacity of each per-finder event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 100;
/// Timeout for a menu-lock-guarded dbserver request.
pub const MENU_LOCK_TIMEOUT_MS: u64 = 20_000;

/// Top-level configuration for the coordination core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network and resolver behavior.
    pub network: NetworkConfig,

    /// Cache sizing.
    pub cache: CacheConfig,

    /// Scratch directory and acquisition settings.
    pub acquire: AcquireConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            cache: CacheConfig::default(),
            acquire: AcquireConfig::default(),
        }
    }
}

/// Network/resolver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// When true, suppresses live dbserver requests except for the `COLLECTION` slot.
    pub passive: bool,

    /// Number of attempts for a file-transfer fetch, 1..=10.
    pub retry_limit: u8,

    /// Whether to request high-resolution album art and prefer the
    /// file-based path upgrade before falling back to ordinary resolution.
    pub high_resolution_art: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            passive: false,
            retry_limit: DEFAULT_RETRY_LIMIT,
            high_resolution_art: false,
        }
    }
}

impl NetworkConfig {
    /// Validate `retry_limit` is in the documented 1..=10 range.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(1..=10).contains(&self.retry_limit) {
            return Err(crate::error::Error::config(format!(
                "retry_limit must be 1..=10, got {}",
                self.retry_limit
            )));
        }
        Ok(())
    }
}

/// Cache sizing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Bound on the second-level (album art) LRU cache, >= 1.
    pub album_art_lru_capacity: usize,

    /// Capacity of each per-finder event queue.
    pub event_queue_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            album_art_lru_capacity: DEFAULT_LRU_CAPACITY,
            event_queue_capacity: EVENT_QUEUE_CAPACITY,
        }
    }
}

/// Database/analysis acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// Base directory under which the per-run scratch directory is created.
    /// `None` means the OS temp directory.
    pub scratch_base: Option<PathBuf>,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self { scratch_base: None }
    }
}

// ============================================================================
// Config file operations
// ============================================================================

/// Directory holding `config.toml`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tracklink-core"))
}

/// Full path to `config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk, falling back to defaults on any error.
///
/// Never fails: an unreadable or malformed config file is logged and
/// defaults are returned instead.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!(target: "config", "could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!(target: "config", path = %path.display(), "no config file found, using defaults");
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!(target: "config", path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                tracing::error!(target: "config", path = %path.display(), error = %e, "failed to parse config file");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!(target: "config", path = %path.display(), error = %e, "failed to read config file");
            Config::default()
        }
    }
}

/// Save configuration to disk, creating the config directory if needed.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!(target: "config", path = %path.display(), "saved config");
    Ok(())
}

/// Configuration I/O errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}
