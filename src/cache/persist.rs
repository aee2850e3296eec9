//! Persistence boundary for the metadata cache.
//!
//! The scheduler calls [`CachePersistence::load`] once at build time and
//! [`CachePersistence::save`] after every successful insert (write-through).
//! Saves run on the blocking pool and are best-effort: failures are logged
//! by the scheduler and never reach callers.
//!
//! [`JsonFileStore`] keeps the cache in a single JSON file, written
//! atomically via a temporary file and rename.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::store::CacheEntry;
use crate::{HuginnError, Result};

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Load/save boundary for cache contents across process lifetimes.
///
/// Implementations are called from blocking threads and may do synchronous
/// I/O.
pub trait CachePersistence: Send + Sync {
    /// Read all persisted entries. A missing store is an empty `Vec`.
    fn load(&self) -> Result<Vec<CacheEntry>>;

    /// Replace the persisted contents with `entries`.
    fn save(&self, entries: &[CacheEntry]) -> Result<()>;
}

/// Persistence that stores nothing.
///
/// Equivalent to building a scheduler without calling
/// [`SchedulerBuilder::persistence`](crate::SchedulerBuilder::persistence);
/// useful where a `CachePersistence` value is required but the cache should
/// stay in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPersistence;

impl CachePersistence for NoPersistence {
    fn load(&self) -> Result<Vec<CacheEntry>> {
        Ok(Vec::new())
    }

    fn save(&self, _entries: &[CacheEntry]) -> Result<()> {
        Ok(())
    }
}

/// Versioned payload wrapper for the cache file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<CacheEntry>,
}

/// Default cache file: `~/.cache/huginn/metadata-cache.json`.
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("huginn")
        .join("metadata-cache.json")
}

/// JSON file persistence.
///
/// ```rust
/// # use huginn::cache::JsonFileStore;
/// let store = JsonFileStore::new("/tmp/huginn/cache.json");
/// assert!(store.path().ends_with("cache.json"));
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(default_cache_path())
    }
}

impl CachePersistence for JsonFileStore {
    fn load(&self) -> Result<Vec<CacheEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(HuginnError::Persistence(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        let file: CacheFile = serde_json::from_str(&content).map_err(|e| {
            HuginnError::Persistence(format!("corrupt cache file {}: {e}", self.path.display()))
        })?;
        if file.version > FORMAT_VERSION {
            return Err(HuginnError::Persistence(format!(
                "unsupported cache file version {} (max supported: {FORMAT_VERSION})",
                file.version
            )));
        }
        Ok(file.entries)
    }

    fn save(&self, entries: &[CacheEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HuginnError::Persistence(format!(
                    "failed to create cache dir {}: {e}",
                    parent.display()
                ))
            })?;
        }

        // Write to tmp file first, then rename for atomicity
        let tmp_path = self.path.with_extension("json.tmp");
        let file = CacheFile {
            version: FORMAT_VERSION,
            entries: entries.to_vec(),
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| HuginnError::Persistence(format!("failed to serialize cache: {e}")))?;
        std::fs::write(&tmp_path, json).map_err(|e| {
            HuginnError::Persistence(format!(
                "failed to write cache file {}: {e}",
                tmp_path.display()
            ))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            HuginnError::Persistence(format!(
                "failed to rename cache file {} → {}: {e}",
                tmp_path.display(),
                self.path.display()
            ))
        })?;

        Ok(())
    }
}
