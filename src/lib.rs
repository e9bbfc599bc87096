#![allow(clippy::doc_markdown)] // Allow technical terms like MySQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # sqlcache
//!
//! Cache-aside query interception for MySQL.
//!
//! ## Overview
//!
//! Every statement passes through [`QueryCache::query`]. Read-only statements
//! (leading keyword `SELECT`) are fingerprinted and looked up in a pluggable
//! cache store; on a miss they run against the database through a bounded
//! connection pool and the rows are stored with a time-to-live. Everything
//! else goes straight to the database.
//!
//! ## Module Organization
//!
//! - [`fingerprint`] - canonical statement digests used as cache keys
//! - [`statement`] - placeholder substitution and keyword classification
//! - [`cache`] - provider trait, registry and the concrete stores
//! - [`database`] - driver seam, MySQL driver and the connection pool
//! - [`query_cache`] - the orchestrator
//! - [`stats`] / [`events`] - counters and lifecycle notifications
//! - [`config`] - layered settings
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sqlcache::{QueryCache, QueryOptions, Settings};
//!
//! # async fn example() -> sqlcache::Result<()> {
//! let settings = Settings::for_database("inventory").with_ttl(30);
//! let cache = QueryCache::initialize(settings).await?;
//!
//! let first = cache.query("SELECT 6 + 6 AS solution").await?;
//! let second = cache.query("select 6+6 as solution").await?;
//! assert!(!first.meta.is_from_cache);
//! assert!(second.meta.is_from_cache);
//!
//! // skip the cache for one call
//! let fresh = cache
//!     .query_with("SELECT * FROM stock WHERE sku = ?", vec!["A-1".into()], QueryOptions::no_cache())
//!     .await?;
//! println!("{:?}", fresh.rows);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod logging;
pub mod query_cache;
pub mod statement;
pub mod stats;
pub mod telemetry;

pub use cache::{CacheProvider, CacheRegistry, ProviderKind, ProviderOptions, Ttl};
pub use config::{ConfigError, Settings};
pub use database::{ConnectionPool, DatabaseTarget, PooledConnection, QueryOutput};
pub use error::{QueryCacheError, Result};
pub use events::{EventKind, QueryEvent};
pub use fingerprint::{fingerprint, DigestAlgorithm, Fingerprint, Fingerprinter};
pub use query_cache::{QueryCache, QueryResponse, ResultDescriptor};
pub use statement::{classify, format_statement, QueryOptions, QueryRequest, SqlValue, StatementKind};
pub use stats::StatisticsSnapshot;
