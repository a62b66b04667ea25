//! Persistent key-value storage adapter
//!
//! The cache core talks to persistence through the narrow [`KeyValueStore`]
//! trait so the disk-backed store can be swapped for a test double or left
//! out entirely (in-memory-only operation when no cache directory exists).

use std::fs;
use std::io;
use std::path::PathBuf;

use directories::ProjectDirs;

/// String-keyed persistent storage.
///
/// Writes may fail when the backing medium is full; the cache core handles
/// that with an eviction pass, so implementations should report the failure
/// rather than swallow it.
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    /// Removes `key`; missing keys are ignored.
    fn remove(&self, key: &str);
    /// Enumerates all stored keys.
    fn keys(&self) -> Vec<String>;
}

/// Disk-backed store keeping one JSON file per key in an XDG-compliant
/// cache directory (`~/.cache/hotwave/` on Linux).
#[derive(Debug, Clone)]
pub struct DiskStorage {
    dir: PathBuf,
}

impl DiskStorage {
    /// Creates a store rooted at the platform cache directory.
    ///
    /// Returns `None` when no home directory can be determined; callers
    /// fall back to in-memory-only caching.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "hotwave")?;
        Some(Self {
            dir: project_dirs.cache_dir().to_path_buf(),
        })
    }

    /// Creates a store rooted at a specific directory (tests).
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    // ':' is not filename-safe on every platform; swap it for '+' on disk.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key.replace(':', "+")))
    }
}

impl KeyValueStore for DiskStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if path.extension()? != "json" {
                    return None;
                }
                Some(path.file_stem()?.to_string_lossy().replace('+', ":"))
            })
            .collect()
    }
}
