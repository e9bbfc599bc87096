//! # Configuration
//!
//! Typed settings for the query cache. `RawSettings` mirrors what the
//! `config` crate deserializes; `Settings` is the validated form handed to
//! `QueryCache::initialize`.

pub mod error;
pub mod loader;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load, load_from};

use crate::cache::{CacheRegistry, ProviderOptions};
use crate::database::DatabaseTarget;
use crate::fingerprint::DigestAlgorithm;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_USER: &str = "root";
const DEFAULT_CONNECTION_LIMIT: usize = 10;
const DEFAULT_CACHE_PROVIDER: &str = "lru";
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;
const DEFAULT_EVENT_CAPACITY: usize = 1_024;

/// Settings exactly as read from files and the environment
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: Option<String>,
    pub connection_limit: usize,
    pub ttl: u64,
    pub verbose: bool,
    pub caching: bool,
    pub cache_provider: String,
    pub cache_provider_settings: ProviderOptions,
    pub digest_algorithm: String,
    pub reconnect_delay_ms: u64,
    /// Initial connection attempts; 0 retries forever
    pub connect_attempts: u32,
    pub event_capacity: usize,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: None,
            database: None,
            connection_limit: DEFAULT_CONNECTION_LIMIT,
            ttl: 0,
            verbose: false,
            caching: true,
            cache_provider: DEFAULT_CACHE_PROVIDER.to_string(),
            cache_provider_settings: ProviderOptions::default(),
            digest_algorithm: DigestAlgorithm::default().name().to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            connect_attempts: 0,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Validated settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    /// Maximum simultaneous leased connections; further callers wait
    pub connection_limit: usize,
    /// Default TTL in seconds for cached results, 0 = no expiry
    pub ttl: u64,
    /// Raise this crate's log target to `trace`
    pub verbose: bool,
    /// Global caching switch; when off, no statement is served from or written to the cache
    pub caching: bool,
    pub cache_provider: String,
    pub cache_provider_settings: ProviderOptions,
    pub digest_algorithm: DigestAlgorithm,
    pub reconnect_delay: Duration,
    /// `None` keeps retrying the initial connection until it succeeds
    pub connect_attempts: Option<u32>,
    pub event_capacity: usize,
}

impl Settings {
    /// Settings for `database` with every other field at its default
    pub fn for_database(database: impl Into<String>) -> Self {
        let raw = RawSettings {
            database: Some(database.into()),
            ..RawSettings::default()
        };
        Self {
            host: raw.host,
            port: raw.port,
            user: raw.user,
            password: raw.password,
            database: raw.database.unwrap_or_default(),
            connection_limit: raw.connection_limit,
            ttl: raw.ttl,
            verbose: raw.verbose,
            caching: raw.caching,
            cache_provider: raw.cache_provider,
            cache_provider_settings: raw.cache_provider_settings,
            digest_algorithm: DigestAlgorithm::default(),
            reconnect_delay: Duration::from_millis(raw.reconnect_delay_ms),
            connect_attempts: (raw.connect_attempts > 0).then_some(raw.connect_attempts),
            event_capacity: raw.event_capacity,
        }
    }

    pub fn with_provider(mut self, name: impl Into<String>, options: ProviderOptions) -> Self {
        self.cache_provider = name.into();
        self.cache_provider_settings = options;
        self
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    pub fn with_connection_limit(mut self, limit: usize) -> Self {
        self.connection_limit = limit;
        self
    }

    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = (attempts > 0).then_some(attempts);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Re-check invariants; used for settings built in code rather than loaded
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField("host"));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::MissingField("user"));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::MissingField("database"));
        }
        if self.connection_limit == 0 {
            return Err(ConfigError::invalid(
                "connection_limit",
                "must be at least 1",
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::invalid("event_capacity", "must be at least 1"));
        }
        CacheRegistry::resolve(&self.cache_provider)?;
        Ok(())
    }

    /// Connection target derived from the host/port/user/password/database fields
    pub fn target(&self) -> DatabaseTarget {
        DatabaseTarget {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = ConfigError;

    fn try_from(raw: RawSettings) -> ConfigResult<Self> {
        let digest_algorithm = raw.digest_algorithm.parse::<DigestAlgorithm>()?;
        let database = raw
            .database
            .filter(|db| !db.trim().is_empty())
            .ok_or(ConfigError::MissingField("database"))?;

        let settings = Self {
            host: raw.host,
            port: raw.port,
            user: raw.user,
            password: raw.password,
            database,
            connection_limit: raw.connection_limit,
            ttl: raw.ttl,
            verbose: raw.verbose,
            caching: raw.caching,
            cache_provider: raw.cache_provider,
            cache_provider_settings: raw.cache_provider_settings,
            digest_algorithm,
            reconnect_delay: Duration::from_millis(raw.reconnect_delay_ms),
            connect_attempts: (raw.connect_attempts > 0).then_some(raw.connect_attempts),
            event_capacity: raw.event_capacity,
        };
        settings.validate()?;
        Ok(settings)
    }
}
