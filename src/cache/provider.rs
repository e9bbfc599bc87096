//! Active cache provider
//!
//! Uses enum dispatch over the concrete stores. Every operation is traced
//! with the provider name and a shortened fingerprint.

use super::errors::{CacheError, CacheResult};
use super::options::ProviderOptions;
use super::providers::{
    FileCacheService, LruCacheService, MokaCacheService, NativeCacheService, NoOpCacheService,
};
use super::registry::{CacheRegistry, ProviderKind};
use super::traits::{CacheService, Ttl};
use crate::error::Result;
use tracing::{debug, info};

#[cfg(feature = "cache-redis")]
use super::providers::RedisCacheService;

/// Characters of a fingerprint shown in traces
const TRACE_KEY_LEN: usize = 12;

/// Internal cache backend enum for zero-cost dispatch
#[derive(Debug, Clone)]
enum CacheBackend {
    Lru(LruCacheService),
    Native(NativeCacheService),
    Moka(Box<MokaCacheService>),
    File(FileCacheService),
    #[cfg(feature = "cache-redis")]
    Redis(Box<RedisCacheService>),
    NoOp(NoOpCacheService),
}

macro_rules! dispatch {
    ($backend:expr, $svc:ident => $call:expr) => {
        match $backend {
            CacheBackend::Lru($svc) => $call,
            CacheBackend::Native($svc) => $call,
            CacheBackend::Moka($svc) => $call,
            CacheBackend::File($svc) => $call,
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis($svc) => $call,
            CacheBackend::NoOp($svc) => $call,
        }
    };
}

impl CacheBackend {
    async fn build(kind: ProviderKind, options: &ProviderOptions) -> CacheResult<Self> {
        match kind {
            ProviderKind::Lru => Ok(Self::Lru(LruCacheService::from_options(options)?)),
            ProviderKind::Native => Ok(Self::Native(NativeCacheService::new())),
            ProviderKind::Moka => Ok(Self::Moka(Box::new(MokaCacheService::from_options(
                options,
            )?))),
            ProviderKind::File => Ok(Self::File(FileCacheService::from_options(options)?)),
            ProviderKind::Redis => Self::build_redis(options).await,
            ProviderKind::Mmap => Err(CacheError::setup(
                "mmap",
                "memory-mapped store is not available in this build; choose `lru`, `native` or `file`",
            )),
            ProviderKind::NoOp => Ok(Self::NoOp(NoOpCacheService::new())),
        }
    }

    #[cfg(feature = "cache-redis")]
    async fn build_redis(options: &ProviderOptions) -> CacheResult<Self> {
        Ok(Self::Redis(Box::new(RedisCacheService::connect(options).await?)))
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn build_redis(_options: &ProviderOptions) -> CacheResult<Self> {
        Err(CacheError::setup(
            "redis",
            "redis support not compiled in (enable the `cache-redis` feature)",
        ))
    }

    fn provider_name(&self) -> &'static str {
        dispatch!(self, s => s.provider_name())
    }

    async fn setup(&self) -> CacheResult<()> {
        dispatch!(self, s => s.setup().await)
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        dispatch!(self, s => s.get(key).await)
    }

    async fn set(&self, key: &str, value: &str, ttl: Ttl) -> CacheResult<()> {
        dispatch!(self, s => s.set(key, value, ttl).await)
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        dispatch!(self, s => s.remove(key).await)
    }

    async fn flush(&self) -> CacheResult<()> {
        dispatch!(self, s => s.flush().await)
    }
}

/// The single active cache store
///
/// Built once from the configured provider name. Replacing it (see
/// `QueryCache::switch_provider`) builds a fresh provider; entries held by
/// the old one are not migrated.
#[derive(Debug, Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
}

impl CacheProvider {
    /// Resolve `name` through the registry, construct the store and run its
    /// setup. Unknown names and failed setup are both fatal.
    pub async fn from_settings(name: &str, options: &ProviderOptions) -> Result<Self> {
        let kind = CacheRegistry::resolve(name)?;
        let backend = CacheBackend::build(kind, options).await?;
        backend.setup().await?;

        info!(provider = backend.provider_name(), "Cache provider ready");
        Ok(Self { backend })
    }

    /// Always-miss provider
    pub fn noop() -> Self {
        Self {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, CacheBackend::NoOp(_))
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.trace("get", key);
        self.backend.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Ttl) -> CacheResult<()> {
        self.trace("set", key);
        self.backend.set(key, value, ttl).await
    }

    pub async fn remove(&self, key: &str) -> CacheResult<()> {
        self.trace("remove", key);
        self.backend.remove(key).await
    }

    pub async fn flush(&self) -> CacheResult<()> {
        self.trace("flush", "");
        self.backend.flush().await
    }

    fn trace(&self, operation: &'static str, key: &str) {
        let short = key.get(..TRACE_KEY_LEN).unwrap_or(key);
        debug!(
            provider = self.provider_name(),
            operation,
            fingerprint = short,
            "CacheProvider"
        );
    }
}
