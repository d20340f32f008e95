//! Time-bounded cache of refreshed coordinates, keyed by the requested id set.

use crate::constants::COORDINATE_CACHE_KEY_PREFIX;
use crate::core::config::CoordinateCacheConfig;
use crate::core::geo::Point;
use crate::data::dataset::TaxId;
use crate::prelude::{Arc, HashMap, Mutex};
use crate::remote::lookup::TaxonomyService;
use crate::remote::store::CacheStore;
use crate::traits::{CacheStats, Cacheable};
use crate::{MapError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type Coordinates = HashMap<TaxId, Point>;

/// A stored lookup result with its wall-clock write time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub value: Coordinates,
}

impl CacheEntry {
    pub fn new(value: Coordinates) -> Self {
        Self {
            timestamp_ms: now_ms(),
            value,
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        now_ms().saturating_sub(self.timestamp_ms) < ttl.as_millis() as u64
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A lookup in flight. Its output is cloned to every waiter, so the error is
/// kept behind an `Arc` until each waiter gets its own copy.
type PendingLookup = Shared<BoxFuture<'static, std::result::Result<Arc<CacheEntry>, Arc<MapError>>>>;

/// Copies a lookup error out of a shared in-flight result
fn unshare(error: &MapError) -> MapError {
    match error {
        MapError::RemoteLookup(msg) => MapError::RemoteLookup(msg.clone()),
        MapError::Configuration(msg) => MapError::Configuration(msg.clone()),
        MapError::Deserialization(msg) => MapError::Deserialization(msg.clone()),
        MapError::CacheWrite(msg) => MapError::CacheWrite(msg.clone()),
        other => MapError::RemoteLookup(other.to_string()),
    }
}

/// In-memory LRU of coordinate lookups with an optional persistent store
/// behind it.
///
/// Entries older than the TTL are never served. Concurrent lookups of the
/// same id set share one in-flight request and the entry is written once.
pub struct CoordinateCache {
    entries: Arc<Mutex<LruCache<String, Arc<CacheEntry>>>>,
    inflight: Mutex<HashMap<String, PendingLookup>>,
    ttl: Duration,
    store: Option<Arc<dyn CacheStore>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CoordinateCache {
    pub fn new(config: &CoordinateCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            inflight: Mutex::new(HashMap::default()),
            ttl: config.ttl(),
            store: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `taxids_` followed by the sorted, deduplicated ids joined by spaces
    pub fn canonical_key(ids: &[TaxId]) -> String {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let joined = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" ");
        format!("{COORDINATE_CACHE_KEY_PREFIX}{joined}")
    }

    /// Fresh entry for `key`, from memory first, then from the store
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let entry = self.lookup(key);
        let counter = if entry.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        entry
    }

    fn lookup(&self, key: &str) -> Option<Arc<CacheEntry>> {
        if let Some(entry) = self.memory_lookup(key) {
            return Some(entry);
        }
        let store = self.store.as_ref()?;
        match store.load(key) {
            Ok(Some(entry)) if entry.is_fresh(self.ttl) => {
                let entry = Arc::new(entry);
                if let Ok(mut entries) = self.entries.lock() {
                    entries.put(key.to_string(), entry.clone());
                }
                Some(entry)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("reading cached coordinates failed: {e}");
                None
            }
        }
    }

    fn memory_lookup(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.is_fresh(self.ttl) => Some(entry.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Stores an entry in memory and, when configured, in the store. A store
    /// write failure only loses persistence.
    pub fn insert(&self, key: String, entry: Arc<CacheEntry>) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&key, &entry) {
                warn!("persisting cached coordinates failed: {e}");
            }
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, entry);
        }
    }

    /// Cached coordinates of `ids`, fetched through `service` on a miss
    pub async fn get_or_fetch(
        &self,
        ids: &[TaxId],
        service: Arc<dyn TaxonomyService>,
    ) -> Result<Arc<CacheEntry>> {
        let key = Self::canonical_key(ids);
        if let Some(entry) = self.get(&key) {
            debug!("coordinate cache hit for {} ids", ids.len());
            return Ok(entry);
        }

        let pending = {
            let Ok(mut inflight) = self.inflight.lock() else {
                return Err(MapError::RemoteLookup("coordinate cache lock poisoned".to_string()));
            };
            inflight
                .entry(key.clone())
                .or_insert_with(|| {
                    let ids = ids.to_vec();
                    async move {
                        service
                            .coordinates(&ids)
                            .await
                            .map(|value| Arc::new(CacheEntry::new(value)))
                            .map_err(Arc::new)
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };

        let result = pending.await;
        let first = self
            .inflight
            .lock()
            .ok()
            .and_then(|mut inflight| inflight.remove(&key))
            .is_some();
        if first {
            if let Ok(entry) = &result {
                self.insert(key, entry.clone());
            }
        }
        result.map_err(|e| unshare(&e))
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!("clearing persisted coordinates failed: {e}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().ok().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

impl Cacheable for CoordinateCache {
    type Key = String;
    type Value = Arc<CacheEntry>;

    fn get_cached(&self, key: &String) -> Option<Arc<CacheEntry>> {
        self.get(key)
    }

    fn cache(&self, key: String, value: Arc<CacheEntry>) {
        self.insert(key, value);
    }

    fn invalidate(&self, key: &String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(key);
        }
    }

    fn clear_cache(&self) {
        self.clear();
    }

    fn cache_stats(&self) -> CacheStats {
        self.stats()
    }
}
