//! # Cache Provider Abstraction
//!
//! A small capability interface (`setup`, `get`, `set`, `remove`, `flush`)
//! implemented by interchangeable stores. The store is chosen once, by name,
//! through [`CacheRegistry`]; the orchestrator only ever talks to
//! [`CacheProvider`].
//!
//! | name (aliases)            | store                                   |
//! |---------------------------|-----------------------------------------|
//! | `lru`                     | bounded in-process map, LRU eviction    |
//! | `native` (`memory`,`map`) | unbounded in-process map                |
//! | `moka` (`node-cache`)     | concurrent in-process TTL cache         |
//! | `file`                    | one JSON file per entry on local disk   |
//! | `redis`                   | external Redis (`cache-redis` feature)  |
//! | `mmap`                    | registered, not available in this build |
//! | `noop` (`none`)           | always miss                             |
//!
//! ```rust
//! use sqlcache::{CacheProvider, ProviderOptions, Ttl};
//!
//! # tokio_test::block_on(async {
//! let options = ProviderOptions::new().with("max_entries", 100);
//! let provider = CacheProvider::from_settings("LRU", &options).await.unwrap();
//!
//! provider.set("key", "[]", Ttl::from_secs(30)).await.unwrap();
//! assert_eq!(provider.get("key").await.unwrap().as_deref(), Some("[]"));
//! # });
//! ```

pub mod errors;
pub mod options;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use options::ProviderOptions;
pub use provider::CacheProvider;
pub use registry::{CacheRegistry, ProviderKind};
pub use traits::{CacheService, Ttl};
