//! Unbounded in-process map provider
//!
//! Entries live until removed, flushed, or their TTL elapses. Expiry is
//! enforced on read, and every `SWEEP_EVERY` writes a sweep drops expired
//! entries that were never read again.

use super::StoredEntry;
use crate::cache::errors::CacheResult;
use crate::cache::traits::{CacheService, Ttl};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Writes between two expiry sweeps
pub const SWEEP_EVERY: usize = 256;

/// In-process cache backed by a concurrent hash map
#[derive(Debug, Clone, Default)]
pub struct NativeCacheService {
    entries: Arc<DashMap<String, StoredEntry>>,
    writes: Arc<AtomicUsize>,
}

impl NativeCacheService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        trace!(removed, "Native cache sweep");
        removed
    }
}

impl CacheService for NativeCacheService {
    async fn setup(&self) -> CacheResult<()> {
        debug!("Native map cache ready");
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }

        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Ttl) -> CacheResult<()> {
        self.entries
            .insert(key.to_string(), StoredEntry::new(value, ttl));

        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "native"
    }
}
