//! Provider name resolution
//!
//! Maps the configured `cache_provider` string onto a concrete store kind.
//! Lookup is case-insensitive and understands a few aliases.

use crate::config::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Every store this build knows how to name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Lru,
    Native,
    Moka,
    File,
    Redis,
    Mmap,
    NoOp,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::Lru,
        ProviderKind::Native,
        ProviderKind::Moka,
        ProviderKind::File,
        ProviderKind::Redis,
        ProviderKind::Mmap,
        ProviderKind::NoOp,
    ];

    /// Canonical name, as reported by `provider_name()`
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Native => "native",
            Self::Moka => "moka",
            Self::File => "file",
            Self::Redis => "redis",
            Self::Mmap => "mmap",
            Self::NoOp => "noop",
        }
    }

    pub const fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Native => &["memory", "map"],
            Self::Moka => &["node-cache"],
            Self::NoOp => &["none"],
            _ => &[],
        }
    }

    fn matches(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
            || self
                .aliases()
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheRegistry::resolve(s)
    }
}

/// Registry of known cache providers
pub struct CacheRegistry;

impl CacheRegistry {
    /// Canonical names of every registered provider
    pub fn supported() -> Vec<&'static str> {
        ProviderKind::ALL.iter().map(ProviderKind::name).collect()
    }

    /// Resolve a configured name; unknown names are a configuration error
    pub fn resolve(name: &str) -> Result<ProviderKind, ConfigError> {
        let trimmed = name.trim();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.matches(trimmed))
            .ok_or_else(|| ConfigError::UnknownProvider(name.to_string()))
    }
}
