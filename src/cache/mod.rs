//! Page content cache
//!
//! Maps a page slug to the last successfully fetched content HTML, stamped with
//! the time it was fetched. Entries older than the TTL read as absent but are
//! left in storage; the next successful fetch overwrites them.
//!
//! The cache is advisory. Every failure (missing key, malformed value, storage
//! disabled, quota exceeded, I/O) degrades to "no entry" on read and to a
//! no-op on write. Nothing here returns an error.
//!
//! Two processes sharing a storage directory race on the same key with no
//! coordination. The last writer wins, which is fine for an advisory cache.

mod storage;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};

/// Storage key prefix; the slug is appended
pub const CACHE_KEY_PREFIX: &str = "dash-content-";

/// Default maximum age of a cached page (2 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60);

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait Clock {
    fn now_millis(&self) -> i64;
}

/// Real time via chrono
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock. Clones share the same time.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: std::rc::Rc<std::cell::Cell<i64>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(millis: i64) -> Self {
        let clock = Self::default();
        clock.now.set(millis);
        clock
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by.as_millis() as i64);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.get()
    }
}

/// Stored value, serialized as `{"html": "...", "fetchedAt": 1700000000000}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub html: String,
    #[serde(rename = "fetchedAt")]
    pub fetched_at: i64,
}

/// TTL-bounded HTML cache keyed by page slug
pub struct ContentCache {
    storage: Box<dyn KeyValueStorage>,
    clock: Box<dyn Clock>,
    ttl: Duration,
}

impl ContentCache {
    /// Cache over `storage` with the system clock and the default TTL
    pub fn new(storage: impl KeyValueStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            clock: Box::new(SystemClock),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key(slug: &str) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, slug)
    }

    /// Cached HTML for `slug`, or `None` if missing, unreadable or expired
    pub fn get(&self, slug: &str) -> Option<String> {
        let raw = match self.storage.get_item(&Self::key(slug)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(slug, "Content cache read failed: {}", e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(slug, "Ignoring malformed cache entry: {}", e);
                return None;
            }
        };

        let Some(age_ms) = self.clock.now_millis().checked_sub(entry.fetched_at) else {
            tracing::debug!(slug, fetched_at = entry.fetched_at, "Ignoring cache entry with unusable timestamp");
            return None;
        };
        if age_ms > self.ttl.as_millis() as i64 {
            tracing::debug!(slug, age_ms, "Cache entry expired");
            return None;
        }

        tracing::debug!(slug, age_ms, "Content cache hit");
        Some(entry.html)
    }

    /// Store `html` for `slug`, stamped with the current time. Best effort.
    pub fn set(&self, slug: &str, html: &str) {
        let entry = CacheEntry {
            html: html.to_string(),
            fetched_at: self.clock.now_millis(),
        };
        let value = match serde_json::to_string(&entry) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(slug, "Failed to serialize cache entry: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set_item(&Self::key(slug), &value) {
            tracing::debug!(slug, "Content cache write skipped: {}", e);
        }
    }
}
