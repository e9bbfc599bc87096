//! Concrete cache store implementations

mod file;
mod lru;
mod moka;
mod native;
mod noop;

#[cfg(feature = "cache-redis")]
mod redis;

pub use self::file::FileCacheService;
pub use self::lru::LruCacheService;
pub use self::moka::MokaCacheService;
pub use self::native::NativeCacheService;
pub use self::noop::NoOpCacheService;

#[cfg(feature = "cache-redis")]
pub use self::redis::RedisCacheService;

use super::traits::Ttl;
use std::time::Instant;

/// Value plus optional deadline, shared by the in-process map stores
#[derive(Debug, Clone)]
pub(crate) struct StoredEntry {
    pub(crate) value: String,
    pub(crate) expires_at: Option<Instant>,
}

impl StoredEntry {
    pub(crate) fn new(value: &str, ttl: Ttl) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.deadline_from(Instant::now()),
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}
