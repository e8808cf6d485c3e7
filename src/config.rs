//! Cache configuration.
//!
//! All the state the cache needs is carried in an explicit [`CacheConfig`]
//! value handed over at construction: the enabled flag, the cache
//! directory, the engine version, and the ordered transform identities.
//! The cache holds no reference to the engine itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for the artifact cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Master switch. When `false`, every cache operation is a no-op and
    /// `load` always reports a miss.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Directory holding one record file per unit.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Engine version identifier, folded into every fingerprint.
    #[serde(default)]
    pub engine_version: String,
    /// Ordered identities of the active output transforms, folded into
    /// every fingerprint. Order matters.
    #[serde(default)]
    pub transform_identities: Vec<String>,
    /// Per-unit write-lock timeout, in seconds.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("tplcache")
}

fn default_lock_timeout_secs() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cache_dir: default_cache_dir(),
            engine_version: String::new(),
            transform_identities: Vec::new(),
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

impl CacheConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Lock timeout as a [`Duration`].
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}
