//! Configuration for the dashboard page client
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/dashpage/config.toml)
//! 3. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod observability;
mod sections;
mod serialization;


// ─────────────────────────────────────────────────────────────────────────────
// Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use observability::{FileLogging, LogRotation, LoggingConfig};
pub use sections::{CacheConfig, FetchConfig, FileCache, FileFetch};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_SLUG: &str = "home";

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Origin of the dashboard server, e.g. `http://127.0.0.1:8080`
    pub server_url: String,

    /// Path prefix the dashboard is mounted under ("" for the root)
    pub base_path: String,

    /// Page to load
    pub slug: String,

    /// Local HTML cache
    pub cache: CacheConfig,

    /// Content fetch timeout and retry
    pub fetch: FetchConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            base_path: String::new(),
            slug: DEFAULT_SLUG.to_string(),
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub server_url: Option<String>,
    pub base_path: Option<String>,
    pub slug: Option<String>,

    /// Optional [cache] section
    pub cache: Option<FileCache>,

    /// Optional [fetch] section
    pub fetch: Option<FileFetch>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl Config {
    /// Get the config file path: ~/.config/dashpage/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("dashpage").join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Config is optional
            }
        }

        let _ = std::fs::write(&path, Self::default().to_toml());
    }

    /// Overwrite the config file with the default template
    pub fn reset_config_file() -> Result<PathBuf> {
        let path = Self::config_path().context("Could not determine home directory")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, Self::default().to_toml())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Load file config if it exists. A file that exists but does not parse is
    /// an error rather than a silent fallback to defaults.
    pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).with_context(|| {
                format!(
                    "Failed to parse configuration file {}\n  \
                     Check for missing quotes, invalid booleans or typos in section names.\n  \
                     To reset, run `dashpage config --reset`.",
                    path.display()
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(e) => {
                Err(e).with_context(|| format!("Cannot read configuration file {}", path.display()))
            }
        }
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> Result<Self> {
        let file = match Self::config_path() {
            Some(path) => Self::load_file_config(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(file, |key| std::env::var(key).ok()))
    }

    /// Merge a parsed file with environment lookups
    pub(crate) fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        // Server origin: env > file > default
        let server_url = env("DASHPAGE_SERVER_URL")
            .or(file.server_url)
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        // Base path: env > file > default (trailing slash dropped)
        let base_path = env("DASHPAGE_BASE_PATH")
            .or(file.base_path)
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();

        // Slug: env > file > default
        let slug = env("DASHPAGE_SLUG")
            .or(file.slug)
            .unwrap_or_else(|| DEFAULT_SLUG.to_string());

        let mut cache = CacheConfig::from_file(file.cache);
        if let Some(dir) = env("DASHPAGE_CACHE_DIR") {
            cache.dir = PathBuf::from(dir);
        }
        // Cache kill switch: env only (runtime flag)
        if env("DASHPAGE_NO_CACHE").is_some_and(|v| is_truthy(&v)) {
            cache.enabled = false;
        }

        let fetch = FetchConfig::from_file(file.fetch);

        let mut logging = LoggingConfig::from_file(file.logging);
        if let Some(level) = env("DASHPAGE_LOG_LEVEL") {
            logging.level = level;
        }

        Self {
            server_url,
            base_path,
            slug,
            cache,
            fetch,
            logging,
        }
    }
}
