//! Bounded in-process provider with least-recently-used eviction

use super::StoredEntry;
use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::options::ProviderOptions;
use crate::cache::traits::{CacheService, Ttl};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// LRU cache service
///
/// Holds at most `max_entries` values; inserting past capacity evicts the
/// least recently read or written entry. TTLs are checked on read.
#[derive(Clone)]
pub struct LruCacheService {
    inner: Arc<Mutex<LruCache<String, StoredEntry>>>,
    capacity: NonZeroUsize,
}

impl std::fmt::Debug for LruCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCacheService")
            .field("capacity", &self.capacity)
            .field("len", &self.inner.lock().len())
            .finish()
    }
}

impl LruCacheService {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
            capacity,
        }
    }

    /// Build from provider settings (`max_entries`)
    pub fn from_options(options: &ProviderOptions) -> CacheResult<Self> {
        let max_entries = options
            .get_u64("max_entries")
            .map_err(|reason| CacheError::setup("lru", reason))?
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_ENTRIES);

        let capacity = NonZeroUsize::new(max_entries)
            .ok_or_else(|| CacheError::setup("lru", "`max_entries` must be greater than zero"))?;

        Ok(Self::new(capacity))
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl CacheService for LruCacheService {
    async fn setup(&self) -> CacheResult<()> {
        debug!(capacity = self.capacity.get(), "LRU cache ready");
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let mut cache = self.inner.lock();

        match cache.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }

        cache.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Ttl) -> CacheResult<()> {
        self.inner
            .lock()
            .put(key.to_string(), StoredEntry::new(value, ttl));
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.inner.lock().pop(key);
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.inner.lock().clear();
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "lru"
    }
}
