//! Persistence for coordinate cache entries so refreshed coordinates survive
//! across sessions.

use crate::prelude::FxHasher;
use crate::remote::cache::CacheEntry;
use crate::{MapError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Key-value backing store for [`CacheEntry`] records
pub trait CacheStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>>;

    fn save(&self, key: &str, entry: &CacheEntry) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    entry: CacheEntry,
}

/// Stores each entry as a bincode file named after the hash of its key
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        self.dir.join(format!("{:016x}.bin", hasher.finish()))
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredEntry = bincode::deserialize(&bytes)?;
        // Hash collisions keep the file but not the entry
        if stored.key != key {
            debug!("cache file for '{key}' holds another key");
            return Ok(None);
        }
        Ok(Some(stored.entry))
    }

    fn save(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let stored = StoredEntry {
            key: key.to_string(),
            entry: entry.clone(),
        };
        let bytes = bincode::serialize(&stored)?;
        fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(self.path_for(key), bytes))
            .map_err(|e| MapError::CacheWrite(format!("{}: {e}", self.dir.display())))
    }

    fn clear(&self) -> Result<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "bin") {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}
