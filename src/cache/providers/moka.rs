//! In-memory cache provider using Moka
//!
//! Bounded, concurrent, in-process. Each entry carries its own TTL through
//! Moka's expiry policy, so per-query TTL overrides are honoured.
//!
//! **Important**: This cache is NOT shared across processes.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::options::ProviderOptions;
use crate::cache::traits::{CacheService, Ttl};
use moka::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct MokaEntry {
    value: String,
    ttl: Option<Duration>,
}

/// Expiry policy reading the TTL stored alongside each value
struct PerEntryTtl;

impl Expiry<String, MokaEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &MokaEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &MokaEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-memory cache service using Moka
#[derive(Clone)]
pub struct MokaCacheService {
    cache: moka::future::Cache<String, MokaEntry>,
    max_capacity: u64,
}

impl std::fmt::Debug for MokaCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheService")
            .field("max_capacity", &self.max_capacity)
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MokaCacheService {
    pub fn new(max_capacity: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        debug!(max_capacity, "Moka in-memory cache service created");

        Self {
            cache,
            max_capacity,
        }
    }

    /// Build from provider settings (`max_capacity`)
    pub fn from_options(options: &ProviderOptions) -> CacheResult<Self> {
        let max_capacity = options
            .get_u64("max_capacity")
            .map_err(|reason| CacheError::setup("moka", reason))?
            .unwrap_or(DEFAULT_MAX_CAPACITY);
        Ok(Self::new(max_capacity))
    }
}

impl CacheService for MokaCacheService {
    async fn setup(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Ttl) -> CacheResult<()> {
        let entry = MokaEntry {
            value: value.to_string(),
            ttl: ttl.as_duration(),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.cache.invalidate_all();
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "moka"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_moka_get_returns_none_on_miss() {
        let svc = MokaCacheService::new(100);
        assert_eq!(svc.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_moka_set_and_get() {
        let svc = MokaCacheService::new(100);
        let value = r#"[{"solution":12}]"#;

        svc.set("test_key", value, Ttl::from_secs(60)).await.unwrap();

        let result = svc.get("test_key").await.unwrap();
        assert_eq!(result, Some(value.to_string()));
    }

    #[tokio::test]
    async fn test_moka_remove() {
        let svc = MokaCacheService::new(100);
        svc.set("to_delete", "value", Ttl::NEVER).await.unwrap();
        assert!(svc.get("to_delete").await.unwrap().is_some());

        svc.remove("to_delete").await.unwrap();
        assert!(svc.get("to_delete").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_moka_per_entry_ttl() {
        let svc = MokaCacheService::new(100);
        svc.set("short", "a", Ttl::from_secs(1)).await.unwrap();
        svc.set("long", "b", Ttl::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1_200)).await;

        assert_eq!(svc.get("short").await.unwrap(), None);
        assert_eq!(svc.get("long").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_moka_flush() {
        let svc = MokaCacheService::new(100);
        svc.set("a", "1", Ttl::NEVER).await.unwrap();
        svc.flush().await.unwrap();
        assert_eq!(svc.get("a").await.unwrap(), None);
    }
}
