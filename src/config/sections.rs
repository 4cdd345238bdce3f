//! Cache and fetch configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::fetch::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT};

// ─────────────────────────────────────────────────────────────────────────────
// Cache Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Local HTML cache settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve cached content before revalidating
    pub enabled: bool,
    /// Directory holding one file per cached page
    pub dir: PathBuf,
    /// How long a cached page stays usable
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: dirs::cache_dir()
                .map(|p| p.join("dashpage"))
                .unwrap_or_else(|| PathBuf::from("./.dashpage-cache")),
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

/// Cache settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileCache {
    pub enabled: Option<bool>,
    pub dir: Option<String>,
    pub ttl_secs: Option<u64>,
}

impl CacheConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileCache>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            enabled: file.enabled.unwrap_or(defaults.enabled),
            dir: file.dir.map(PathBuf::from).unwrap_or(defaults.dir),
            ttl_secs: file.ttl_secs.unwrap_or(defaults.ttl_secs),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetch Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Content fetch timeout and retry policy
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Whole-request timeout, body included
    pub timeout_ms: u64,
    /// Pause before retrying a network failure
    pub retry_delay_ms: u64,
    /// Retries after the first attempt (network failures only)
    pub max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Fetch settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileFetch {
    pub timeout_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

impl FetchConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileFetch>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            timeout_ms: file.timeout_ms.unwrap_or(defaults.timeout_ms),
            retry_delay_ms: file.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
            max_retries: file.max_retries.unwrap_or(defaults.max_retries),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
