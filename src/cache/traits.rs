//! Cache service trait definition

use super::errors::CacheResult;
use std::fmt;
use std::time::{Duration, Instant};

/// Time-to-live for a cache entry, in whole seconds.
///
/// Zero means the entry never expires on its own; it stays until it is
/// removed, flushed, or evicted by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Ttl(u64);

impl Ttl {
    /// Entry without expiry
    pub const NEVER: Ttl = Ttl(0);

    pub const fn from_secs(seconds: u64) -> Self {
        Self(seconds)
    }

    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    pub const fn is_never(&self) -> bool {
        self.0 == 0
    }

    /// Duration until expiry, `None` for entries that never expire
    pub fn as_duration(&self) -> Option<Duration> {
        (!self.is_never()).then(|| Duration::from_secs(self.0))
    }

    /// Absolute deadline measured from `now`
    pub fn deadline_from(&self, now: Instant) -> Option<Instant> {
        self.as_duration().map(|ttl| now + ttl)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            write!(f, "never")
        } else {
            write!(f, "{}s", self.0)
        }
    }
}

/// Trait defining cache operations
///
/// Implemented by every concrete store. Values are opaque serialized strings;
/// the orchestrator owns the encoding. All operations are async and return
/// `CacheResult` so a failing store is reported to the caller instead of
/// being swallowed.
pub trait CacheService: Send + Sync {
    /// One-time preparation: allocate maps, create directories, verify the
    /// backend is reachable.
    fn setup(&self) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Get a value from the cache by key
    ///
    /// Returns `Ok(Some(value))` on cache hit, `Ok(None)` when the key is
    /// absent or its TTL has elapsed.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<String>>> + Send;

    /// Store a value under `key` with the given TTL
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Ttl,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete a single key; deleting an absent key succeeds
    fn remove(&self, key: &str) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete every entry held by this store
    fn flush(&self) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_never_expires() {
        assert!(Ttl::NEVER.is_never());
        assert_eq!(Ttl::from_secs(0), Ttl::NEVER);
        assert_eq!(Ttl::NEVER.as_duration(), None);
        assert_eq!(Ttl::NEVER.deadline_from(Instant::now()), None);
    }

    #[test]
    fn test_ttl_deadline() {
        let now = Instant::now();
        let ttl = Ttl::from_secs(5);
        assert_eq!(ttl.as_duration(), Some(Duration::from_secs(5)));
        assert_eq!(ttl.deadline_from(now), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_ttl_display() {
        assert_eq!(Ttl::NEVER.to_string(), "never");
        assert_eq!(Ttl::from_secs(60).to_string(), "60s");
    }
}
