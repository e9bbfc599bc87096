//! # Query Orchestrator
//!
//! Cache-aside decision engine. For every statement:
//!
//! 1. classify on the leading keyword; anything but `SELECT` goes straight
//!    to the database and never touches the cache
//! 2. fingerprint the formatted statement
//! 3. caching for this call = global switch AND per-call `cache` (default on)
//! 4. on a hit, return the stored rows without a database round trip
//! 5. on a miss, execute through a pooled connection and store the rows with
//!    the per-call TTL, falling back to the global default
//!
//! Errors are returned to the caller and never populate the cache.
//! Concurrent misses on one fingerprint both execute; the last write wins.

use crate::cache::{CacheProvider, ProviderOptions, Ttl};
use crate::config::Settings;
use crate::database::{ConnectionPool, DatabaseTarget, Driver, PoolConfig, QueryOutput};
use crate::error::Result;
use crate::events::{EventKind, EventPublisher, QueryEvent};
use crate::fingerprint::{Fingerprint, Fingerprinter};
use crate::statement::{format_statement, QueryOptions, QueryRequest, SqlValue, StatementKind};
use crate::stats::{Statistics, StatisticsSnapshot};
use crate::{logging, telemetry};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Result of [`QueryCache::query`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub rows: QueryOutput,
    pub meta: ResultDescriptor,
}

/// How a response was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDescriptor {
    pub is_from_cache: bool,
    /// Cache key; `None` for statements that bypass the cache
    pub fingerprint: Option<Fingerprint>,
    /// Statement as sent (or as it would have been sent) to the database
    pub statement: String,
    pub kind: StatementKind,
}

struct QueryCacheInner {
    pool: ConnectionPool,
    provider: RwLock<Arc<CacheProvider>>,
    fingerprinter: Fingerprinter,
    default_ttl: AtomicU64,
    caching: AtomicBool,
    stats: Statistics,
    events: EventPublisher,
}

/// Handle to an initialized query cache; cheap to clone
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<QueryCacheInner>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("provider", &self.provider_name())
            .field("caching", &self.caching_enabled())
            .field("default_ttl", &self.default_ttl())
            .field("pool", &self.inner.pool)
            .finish()
    }
}

impl QueryCache {
    /// Connect to MySQL and set up the configured cache provider
    #[cfg(feature = "mysql")]
    pub async fn initialize(settings: Settings) -> Result<Self> {
        Self::initialize_with_driver(settings, Arc::new(crate::database::MySqlDriver)).await
    }

    /// Same as `initialize`, with an explicit database driver
    pub async fn initialize_with_driver(settings: Settings, driver: Arc<dyn Driver>) -> Result<Self> {
        settings.validate()?;
        if settings.verbose {
            logging::init_with_verbosity(true);
        }
        telemetry::describe_metrics();

        let provider =
            CacheProvider::from_settings(&settings.cache_provider, &settings.cache_provider_settings)
                .await?;

        let events = EventPublisher::new(settings.event_capacity);
        let pool = ConnectionPool::new(
            driver,
            PoolConfig {
                target: settings.target(),
                connection_limit: settings.connection_limit,
                reconnect_delay: settings.reconnect_delay,
            },
            events.clone(),
        );
        pool.connect_with_retry(settings.reconnect_delay, settings.connect_attempts)
            .await?;

        info!(
            provider = provider.provider_name(),
            caching = settings.caching,
            ttl = settings.ttl,
            connection_limit = settings.connection_limit,
            digest = %settings.digest_algorithm,
            "Query cache initialized"
        );

        Ok(Self {
            inner: Arc::new(QueryCacheInner {
                pool,
                provider: RwLock::new(Arc::new(provider)),
                fingerprinter: Fingerprinter::new(settings.digest_algorithm),
                default_ttl: AtomicU64::new(settings.ttl),
                caching: AtomicBool::new(settings.caching),
                stats: Statistics::new(),
                events,
            }),
        })
    }

    /// Run a statement through the cache-aside protocol
    pub async fn query(&self, request: impl Into<QueryRequest>) -> Result<QueryResponse> {
        let request = request.into();
        let kind = request.kind();
        self.inner.stats.record_statement(kind);
        telemetry::record_statement(kind);

        let statement = request.formatted();
        let result = if kind.is_cacheable() {
            self.cached_select(statement, request.options).await
        } else {
            self.passthrough(statement, kind).await
        };

        if let Err(e) = &result {
            self.inner.stats.record_error();
            telemetry::record_error();
            debug!(kind = %kind, error = %e, "Statement failed");
        }
        result
    }

    /// Convenience form of [`query`](Self::query)
    pub async fn query_with(
        &self,
        statement: &str,
        params: Vec<SqlValue>,
        options: QueryOptions,
    ) -> Result<QueryResponse> {
        self.query(
            QueryRequest::new(statement)
                .with_params(params)
                .with_options(options),
        )
        .await
    }

    async fn cached_select(&self, statement: String, options: QueryOptions) -> Result<QueryResponse> {
        let fingerprint = self.inner.fingerprinter.fingerprint(&statement);
        // global off is a hard veto; per-call `cache: true` cannot override it
        let caching = self.caching_enabled() && options.cache.unwrap_or(true);
        let provider = self.provider();

        if caching {
            let lookup = match provider.get(fingerprint.as_str()).await {
                Ok(found) => found,
                Err(e) => {
                    self.record_miss();
                    return Err(e.into());
                }
            };

            if let Some(cached) = lookup {
                match serde_json::from_str::<QueryOutput>(&cached) {
                    Ok(rows) => {
                        self.inner.stats.record_hit();
                        telemetry::record_hit();
                        debug!(fingerprint = fingerprint.short(), "Cache hit");
                        self.inner.events.publish(EventKind::Hit {
                            fingerprint: fingerprint.clone(),
                            statement: statement.clone(),
                        });
                        return Ok(QueryResponse {
                            rows,
                            meta: ResultDescriptor {
                                is_from_cache: true,
                                fingerprint: Some(fingerprint),
                                statement,
                                kind: StatementKind::Select,
                            },
                        });
                    }
                    Err(e) => {
                        warn!(
                            fingerprint = fingerprint.short(),
                            error = %e,
                            "Discarding undecodable cache entry"
                        );
                    }
                }
            }
        }

        self.record_miss();
        debug!(fingerprint = fingerprint.short(), caching, "Cache miss");
        self.inner.events.publish(EventKind::Miss {
            fingerprint: fingerprint.clone(),
            statement: statement.clone(),
        });

        let rows = self.execute(&statement, StatementKind::Select).await?;

        if caching {
            let ttl = Ttl::from_secs(options.ttl.unwrap_or_else(|| self.default_ttl()));
            let encoded = serde_json::to_string(&rows)?;
            provider.set(fingerprint.as_str(), &encoded, ttl).await?;
            debug!(fingerprint = fingerprint.short(), ttl = %ttl, "Cache populated");
        }

        Ok(QueryResponse {
            rows,
            meta: ResultDescriptor {
                is_from_cache: false,
                fingerprint: Some(fingerprint),
                statement,
                kind: StatementKind::Select,
            },
        })
    }

    async fn passthrough(&self, statement: String, kind: StatementKind) -> Result<QueryResponse> {
        let rows = self.execute(&statement, kind).await?;
        Ok(QueryResponse {
            rows,
            meta: ResultDescriptor {
                is_from_cache: false,
                fingerprint: None,
                statement,
                kind,
            },
        })
    }

    async fn execute(&self, statement: &str, kind: StatementKind) -> Result<QueryOutput> {
        self.inner.events.publish(EventKind::Query {
            kind,
            statement: statement.to_string(),
        });

        let sql = statement.to_string();
        let rows = self
            .inner
            .pool
            .scoped(move |conn| Box::pin(async move { conn.execute(&sql).await }))
            .await?;
        Ok(rows)
    }

    fn record_miss(&self) {
        self.inner.stats.record_miss();
        telemetry::record_miss();
    }

    fn provider(&self) -> Arc<CacheProvider> {
        self.inner.provider.read().clone()
    }

    /// Cache key for a statement and its parameters
    pub fn fingerprint_of(&self, statement: &str, params: &[SqlValue]) -> Fingerprint {
        self.inner
            .fingerprinter
            .fingerprint(&format_statement(statement, params))
    }

    /// Drop the cached result of one statement
    pub async fn remove_cache_entry(&self, statement: &str, params: &[SqlValue]) -> Result<()> {
        let fingerprint = self.fingerprint_of(statement, params);
        self.provider().remove(fingerprint.as_str()).await?;

        debug!(fingerprint = fingerprint.short(), "Cache entry removed");
        self.inner
            .events
            .publish(EventKind::CacheEntryRemoved { fingerprint });
        Ok(())
    }

    /// Drop every cached result
    pub async fn flush_cache(&self) -> Result<()> {
        let provider = self.provider();
        provider.flush().await?;

        info!(provider = provider.provider_name(), "Cache flushed");
        self.inner.events.publish(EventKind::CacheFlushed {
            provider: provider.provider_name(),
        });
        Ok(())
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            pool_outstanding: self.inner.pool.outstanding(),
            connection_limit: self.inner.pool.limit(),
            ..self.inner.stats.snapshot()
        }
    }

    /// Log the statistics report and return the figures it was built from
    pub fn report_statistics(&self) -> StatisticsSnapshot {
        let snapshot = self.statistics();
        info!(
            queries = snapshot.queries,
            selects = snapshot.selects,
            hits = snapshot.hits,
            misses = snapshot.misses,
            inserts = snapshot.inserts,
            updates = snapshot.updates,
            deletes = snapshot.deletes,
            other = snapshot.other,
            errors = snapshot.errors,
            hit_ratio = snapshot.hit_ratio(),
            queries_per_second = snapshot.queries_per_second,
            pool_outstanding = snapshot.pool_outstanding,
            connection_limit = snapshot.connection_limit,
            provider = self.provider_name(),
            "Query cache statistics"
        );
        if snapshot.is_high_load() {
            warn!(
                queries_per_second = snapshot.queries_per_second,
                "Queries per second is high"
            );
        }
        if snapshot.pool_exhausted() {
            warn!(
                connection_limit = snapshot.connection_limit,
                "Connection pool limit reached"
            );
        }
        snapshot
    }

    /// Point the pool at a different database; the old target stays active on failure
    pub async fn change_database_target(&self, target: DatabaseTarget) -> Result<()> {
        self.inner.pool.change_target(target.clone()).await?;
        self.inner.events.publish(EventKind::TargetChanged {
            target: target.to_string(),
        });
        Ok(())
    }

    /// Close the pool; outstanding statements finish, new ones fail
    pub async fn shutdown_pool(&self) -> Result<()> {
        self.inner.pool.shutdown().await?;
        self.inner.events.publish(EventKind::PoolClosed);
        Ok(())
    }

    /// Replace the active cache store. The new store starts empty; on error
    /// the current one stays active.
    pub async fn switch_provider(&self, name: &str, options: &ProviderOptions) -> Result<()> {
        let replacement = Arc::new(CacheProvider::from_settings(name, options).await?);
        let to = replacement.provider_name();
        let previous = std::mem::replace(&mut *self.inner.provider.write(), replacement);

        info!(from = previous.provider_name(), to, "Cache provider switched");
        self.inner.events.publish(EventKind::ProviderSwitched {
            from: previous.provider_name(),
            to,
        });
        Ok(())
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.provider.read().provider_name()
    }

    pub fn set_default_ttl(&self, ttl: u64) {
        self.inner.default_ttl.store(ttl, Ordering::Release);
    }

    pub fn default_ttl(&self) -> u64 {
        self.inner.default_ttl.load(Ordering::Acquire)
    }

    pub fn set_caching_enabled(&self, enabled: bool) {
        self.inner.caching.store(enabled, Ordering::Release);
    }

    pub fn caching_enabled(&self) -> bool {
        self.inner.caching.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.inner.events.subscribe()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }
}
