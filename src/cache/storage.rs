//! Key/value storage backends for the content cache
//!
//! Both backends store plain text under string keys, the same contract as
//! browser localStorage. Failures are reported as [`StorageError`]; the cache
//! decides whether they matter (they don't).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

/// Errors that can occur when reading or writing storage
#[derive(Debug)]
pub enum StorageError {
    /// Storage is turned off (private browsing, policy, `--no-cache`)
    Disabled,
    /// Writing would exceed the storage quota
    QuotaExceeded { needed: usize, quota: usize },
    /// Filesystem error
    Io(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Storage is disabled"),
            Self::QuotaExceeded { needed, quota } => {
                write!(f, "Storage quota exceeded ({} of {} bytes)", needed, quota)
            }
            Self::Io(e) => write!(f, "Storage I/O error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Text storage keyed by string
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory storage
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryInner {
    items: HashMap<String, String>,
    quota: Option<usize>,
    disabled: bool,
}

/// Process-lifetime storage. Clones share the same items, like two tabs
/// sharing one origin's localStorage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push total key+value bytes above `bytes`
    #[allow(dead_code)] // Exercised by quota tests; hosts may cap memory use
    pub fn with_quota(self, bytes: usize) -> Self {
        self.inner.borrow_mut().quota = Some(bytes);
        self
    }

    /// Every access fails with [`StorageError::Disabled`]
    pub fn disabled() -> Self {
        let storage = Self::default();
        storage.inner.borrow_mut().disabled = true;
        storage
    }

    /// Store a raw value, bypassing quota (seeding and tests)
    #[allow(dead_code)]
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.inner
            .borrow_mut()
            .items
            .insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.inner.borrow();
        if inner.disabled {
            return Err(StorageError::Disabled);
        }
        Ok(inner.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.borrow_mut();
        if inner.disabled {
            return Err(StorageError::Disabled);
        }
        if let Some(quota) = inner.quota {
            let others: usize = inner
                .items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        inner.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File storage
// ─────────────────────────────────────────────────────────────────────────────

/// One file per key under a cache directory. Survives restarts.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File path for a key; characters outside `[A-Za-z0-9._-]` become `_`
    /// One file per key. Bytes outside `[A-Za-z0-9._-]` are percent-encoded,
    /// so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for b in key.bytes() {
            if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-') {
                name.push(b as char);
            } else {
                name.push_str(&format!("%{:02X}", b));
            }
        }
        self.dir.join(format!("{}.json", name))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write then rename so readers never see a half-written entry
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_clones_share_items() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set_item("k", "v").unwrap();
        assert_eq!(b.get_item("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_memory_storage_quota() {
        let storage = MemoryStorage::new().with_quota(10);
        storage.set_item("k", "12345").unwrap();
        // Overwriting the same key only counts the new value
        storage.set_item("k", "123456789").unwrap();
        let err = storage.set_item("k2", "1").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 10, .. }));
    }

    #[test]
    fn test_disabled_storage_fails_everything() {
        let storage = MemoryStorage::disabled();
        assert!(matches!(storage.get_item("k"), Err(StorageError::Disabled)));
        assert!(matches!(storage.set_item("k", "v"), Err(StorageError::Disabled)));
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get_item("dash-content-home").unwrap(), None);
        storage.set_item("dash-content-home", "{\"html\":\"x\"}").unwrap();
        assert_eq!(
            storage.get_item("dash-content-home").unwrap().as_deref(),
            Some("{\"html\":\"x\"}")
        );
        assert!(dir.path().join("nested/dash-content-home.json").exists());
    }

    #[test]
    fn test_file_storage_encodes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set_item("dash-content-../etc", "v").unwrap();
        assert!(dir.path().join("dash-content-..%2Fetc.json").exists());
        assert_eq!(storage.get_item("dash-content-../etc").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_file_storage_keeps_similar_keys_apart() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set_item("dash-content-team/ops", "slash").unwrap();
        storage.set_item("dash-content-team_ops", "underscore").unwrap();
        storage.set_item("dash-content-team%2Fops", "literal").unwrap();

        assert_eq!(storage.get_item("dash-content-team/ops").unwrap().as_deref(), Some("slash"));
        assert_eq!(storage.get_item("dash-content-team_ops").unwrap().as_deref(), Some("underscore"));
        assert_eq!(storage.get_item("dash-content-team%2Fops").unwrap().as_deref(), Some("literal"));
    }
}
