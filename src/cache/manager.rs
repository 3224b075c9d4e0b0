//! Disk-backed cache store
//!
//! Provides a `FileCacheStore` that persists cache entries as JSON files, one
//! per key. Entries keep their expiry so expired data can still be served
//! when the upstream API is unavailable.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use directories::ProjectDirs;
use tempfile::NamedTempFile;
use tracing::debug;

use super::store::{CacheError, CacheStore, StoredEntry};
use super::value::CacheValue;

/// Stores cache entries as JSON files in a directory
///
/// The default location is XDG-compliant (`~/.cache/apifetch/` on Linux).
/// Files that cannot be read or parsed are treated as missing entries.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl FileCacheStore {
    /// Creates a store in the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "apifetch")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a store in a custom directory
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", file_stem(key)))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Option<StoredEntry> {
        let path = self.cache_path(key);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(key, path = %path.display(), error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &CacheValue, tags: &BTreeSet<String>) -> Result<(), CacheError> {
        self.ensure_dir()?;

        let entry = StoredEntry {
            data: value.clone(),
            tags: tags.clone(),
            cached_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&entry)?;

        // Write then rename so concurrent readers never observe a partial file
        let mut tmp = NamedTempFile::new_in(&self.cache_dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(self.cache_path(key)).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Maps a cache key onto a safe file name
///
/// Bytes outside `[A-Za-z0-9._-]` (including `%`) are percent-encoded, so
/// distinct keys always map to distinct names.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{:02X}", byte);
        }
    }
    stem
}
