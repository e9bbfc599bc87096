//! # Connection Pool Manager
//!
//! Bounded leasing of database sessions. At most `connection_limit` leases
//! are outstanding per target; further callers wait on a semaphore instead
//! of failing.
//!
//! Each target lives in a *generation*: its connector, its permits and its
//! idle sessions. Switching targets installs a new generation and retires
//! the old one. Leases taken from a retired generation finish normally and
//! their sessions are closed on release instead of being reused; callers
//! still waiting on the retired semaphore retry against the new generation.
//!
//! A lost connection discards every idle session of the generation, and the
//! background reconnect swaps in a freshly verified one, so after an outage
//! callers are not handed sessions to the old server process.

use super::connection::{
    Connector, DatabaseError, DatabaseResult, DatabaseTarget, Driver, QueryOutput, Session,
};
use crate::events::{EventKind, EventPublisher};
use crate::telemetry;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, trace, warn};

/// Pool failures
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Connection pool is closed")]
    Closed,

    #[error("Connection pool is not connected")]
    NotConnected,

    #[error("Gave up connecting after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: DatabaseError },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Static pool parameters
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub target: DatabaseTarget,
    pub connection_limit: usize,
    /// Delay between attempts in the background reconnect loop
    pub reconnect_delay: Duration,
}

struct Generation {
    id: u64,
    connector: Arc<dyn Connector>,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn Session>>>,
    retired: AtomicBool,
}

impl Generation {
    fn new(id: u64, connector: Arc<dyn Connector>, limit: usize) -> Self {
        Self {
            id,
            connector,
            permits: Arc::new(Semaphore::new(limit.min(Semaphore::MAX_PERMITS))),
            idle: Mutex::new(Vec::new()),
            retired: AtomicBool::new(false),
        }
    }

    fn take_idle(&self) -> Option<Box<dyn Session>> {
        self.idle.lock().pop()
    }

    /// Park a session for reuse; hands it back if this generation is retired
    fn put_back(&self, session: Box<dyn Session>) -> Option<Box<dyn Session>> {
        let mut idle = self.idle.lock();
        if self.retired.load(Ordering::Acquire) {
            return Some(session);
        }
        idle.push(session);
        None
    }

    /// Take every idle session out of rotation
    fn drain_idle(&self) -> Vec<Box<dyn Session>> {
        std::mem::take(&mut *self.idle.lock())
    }

    /// Replace all idle sessions with `fresh`; returns the sessions to close
    fn refresh_idle(&self, fresh: Box<dyn Session>) -> Vec<Box<dyn Session>> {
        let mut idle = self.idle.lock();
        if self.retired.load(Ordering::Acquire) {
            return vec![fresh];
        }
        let stale = std::mem::take(&mut *idle);
        idle.push(fresh);
        stale
    }

    /// Stop handing out leases; returns the idle sessions to close
    fn retire(&self) -> Vec<Box<dyn Session>> {
        let mut idle = self.idle.lock();
        self.retired.store(true, Ordering::Release);
        self.permits.close();
        std::mem::take(&mut *idle)
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generation")
            .field("id", &self.id)
            .field("target", self.connector.target())
            .field("available_permits", &self.permits.available_permits())
            .field("retired", &self.retired.load(Ordering::Relaxed))
            .finish()
    }
}

struct PoolShared {
    driver: Arc<dyn Driver>,
    limit: usize,
    reconnect_delay: Duration,
    target: RwLock<DatabaseTarget>,
    current: RwLock<Option<Arc<Generation>>>,
    outstanding: AtomicUsize,
    next_lease: AtomicU64,
    next_generation: AtomicU64,
    closed: AtomicBool,
    reconnecting: AtomicBool,
    events: EventPublisher,
}

impl PoolShared {
    fn current_generation(&self) -> PoolResult<Arc<Generation>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        self.current.read().clone().ok_or(PoolError::NotConnected)
    }

    fn lease_ended(&self) -> usize {
        let previous = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        let now = previous.saturating_sub(1);
        telemetry::record_pool_outstanding(now);
        now
    }

    /// Swap in a new generation seeded with an already-open session
    fn install(
        &self,
        connector: Arc<dyn Connector>,
        seed: Box<dyn Session>,
    ) -> (Arc<Generation>, Option<Arc<Generation>>) {
        let id = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let generation = Arc::new(Generation::new(id, connector, self.limit));
        generation.idle.lock().push(seed);

        let previous = self.current.write().replace(generation.clone());
        (generation, previous)
    }
}

/// Close sessions without blocking the caller
fn close_in_background(sessions: Vec<Box<dyn Session>>) {
    if sessions.is_empty() {
        return;
    }
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                for session in sessions {
                    if let Err(e) = session.close().await {
                        debug!(error = %e, "Error closing drained session");
                    }
                }
            });
        }
        // outside a runtime the sessions are simply dropped
        Err(_) => drop(sessions),
    }
}

/// Bounded connection pool
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("target", &*self.shared.target.read())
            .field("limit", &self.shared.limit)
            .field("outstanding", &self.outstanding())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionPool {
    /// Create an unconnected pool; call [`connect_with_retry`](Self::connect_with_retry) next
    pub fn new(driver: Arc<dyn Driver>, config: PoolConfig, events: EventPublisher) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                driver,
                limit: config.connection_limit.max(1),
                reconnect_delay: config.reconnect_delay,
                target: RwLock::new(config.target),
                current: RwLock::new(None),
                outstanding: AtomicUsize::new(0),
                next_lease: AtomicU64::new(1),
                next_generation: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                reconnecting: AtomicBool::new(false),
                events,
            }),
        }
    }

    /// Establish the first connection, retrying on a fixed delay.
    ///
    /// `max_attempts = None` retries until it succeeds or the pool is shut
    /// down.
    pub async fn connect_with_retry(
        &self,
        delay: Duration,
        max_attempts: Option<u32>,
    ) -> PoolResult<()> {
        let target = self.shared.target.read().clone();
        let connector = self.shared.driver.connector(&target)?;
        let mut attempts: u32 = 0;

        loop {
            if self.is_closed() {
                return Err(PoolError::Closed);
            }
            attempts += 1;

            match connector.open().await {
                Ok(session) => {
                    let (generation, previous) = self.shared.install(connector, session);
                    if let Some(previous) = previous {
                        close_in_background(previous.retire());
                    }
                    info!(
                        database = %target,
                        generation = generation.id,
                        attempts,
                        "Connected to database"
                    );
                    self.shared.events.publish(EventKind::Connected {
                        target: target.to_string(),
                    });
                    return Ok(());
                }
                Err(e) => {
                    if max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(PoolError::RetriesExhausted { attempts, last: e });
                    }
                    warn!(
                        database = %target,
                        attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Database connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Lease a connection, waiting while the pool is at its limit
    pub async fn acquire(&self) -> PoolResult<PooledConnection> {
        loop {
            let generation = self.shared.current_generation()?;

            let permit = match generation.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                // generation retired while we waited; retry against its successor
                Err(_) => continue,
            };

            let session = match generation.take_idle() {
                Some(session) => session,
                None => match generation.connector.open().await {
                    Ok(session) => session,
                    Err(e) => {
                        self.on_connection_error(&e);
                        return Err(e.into());
                    }
                },
            };

            let lease_id = self.shared.next_lease.fetch_add(1, Ordering::Relaxed);
            let outstanding = self.shared.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
            telemetry::record_pool_outstanding(outstanding);
            trace!(
                lease_id,
                generation = generation.id,
                outstanding,
                "Connection acquired"
            );

            return Ok(PooledConnection {
                lease_id,
                session: Some(session),
                generation,
                permit: Some(permit),
                shared: self.shared.clone(),
                released: false,
                broken: false,
            });
        }
    }

    /// Return a leased connection. A second release of the same lease
    /// returns `false` and leaves the bookkeeping untouched.
    pub fn release(&self, connection: &mut PooledConnection) -> bool {
        connection.release()
    }

    /// Run `f` with a leased connection, releasing it on success and on failure
    pub async fn scoped<T, F>(&self, f: F) -> PoolResult<T>
    where
        F: for<'c> FnOnce(&'c mut PooledConnection) -> BoxFuture<'c, DatabaseResult<T>>,
    {
        let mut connection = self.acquire().await?;
        let result = f(&mut connection).await;
        connection.release();

        result.map_err(|e| {
            self.on_connection_error(&e);
            PoolError::Database(e)
        })
    }

    /// Point the pool at a different database.
    ///
    /// The new target is validated by opening a session before anything is
    /// swapped; on failure the current target stays active.
    pub async fn change_target(&self, target: DatabaseTarget) -> PoolResult<()> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let connector = self.shared.driver.connector(&target)?;
        let session = connector.open().await.map_err(|e| {
            warn!(database = %target, error = %e, "Could not change database target");
            e
        })?;

        let (generation, previous) = self.shared.install(connector, session);
        *self.shared.target.write() = target.clone();

        if let Some(previous) = previous {
            debug!(
                retired = previous.id,
                generation = generation.id,
                "Draining previous database target"
            );
            close_in_background(previous.retire());
        }

        info!(database = %target, generation = generation.id, "Database target changed");
        Ok(())
    }

    /// Close the pool. Leases already out finish normally; new acquisitions
    /// fail with [`PoolError::Closed`].
    pub async fn shutdown(&self) -> PoolResult<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let current = self.shared.current.write().take();
        if let Some(generation) = current {
            for session in generation.retire() {
                if let Err(e) = session.close().await {
                    debug!(error = %e, "Error closing idle session during shutdown");
                }
            }
        }

        info!(outstanding = self.outstanding(), "Connection pool closed");
        Ok(())
    }

    /// Leases currently out
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    pub fn target(&self) -> DatabaseTarget {
        self.shared.target.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        !self.is_closed() && self.shared.current.read().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Whether the background reconnect loop is running
    pub fn is_reconnecting(&self) -> bool {
        self.shared.reconnecting.load(Ordering::Acquire)
    }

    fn on_connection_error(&self, error: &DatabaseError) {
        if matches!(
            error,
            DatabaseError::ConnectionLost(_) | DatabaseError::Connect { .. }
        ) {
            self.spawn_reconnect(error);
        }
    }

    /// Start the fixed-delay reconnect loop unless one is already running
    fn spawn_reconnect(&self, error: &DatabaseError) {
        if self
            .shared
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        warn!(error = %error, "Database connection lost, reconnecting in background");
        self.shared.events.publish(EventKind::ConnectionLost {
            reason: error.to_string(),
        });

        // idle sessions share the failed server and are assumed dead too
        if let Ok(generation) = self.shared.current_generation() {
            close_in_background(generation.drain_idle());
        }

        let shared = self.shared.clone();
        tokio::spawn(async move {
            let mut attempts: u32 = 0;
            loop {
                tokio::time::sleep(shared.reconnect_delay).await;
                let Ok(generation) = shared.current_generation() else {
                    break;
                };
                attempts += 1;

                match generation.connector.open().await {
                    Ok(mut session) => match session.ping().await {
                        Ok(()) => {
                            // sessions parked during the outage are stale as well
                            let stale = generation.refresh_idle(session);
                            debug!(
                                discarded = stale.len(),
                                "Replacing idle sessions after reconnect"
                            );
                            close_in_background(stale);
                            info!(attempts, "Database connection re-established");
                            shared.events.publish(EventKind::Connected {
                                target: generation.connector.target().to_string(),
                            });
                            break;
                        }
                        Err(e) => warn!(attempts, error = %e, "Reconnect ping failed"),
                    },
                    Err(e) => warn!(attempts, error = %e, "Reconnect attempt failed"),
                }
            }
            shared.reconnecting.store(false, Ordering::Release);
        });
    }
}

/// A leased session
///
/// Released explicitly with [`release`](Self::release) or implicitly on drop.
pub struct PooledConnection {
    lease_id: u64,
    session: Option<Box<dyn Session>>,
    generation: Arc<Generation>,
    permit: Option<OwnedSemaphorePermit>,
    shared: Arc<PoolShared>,
    released: bool,
    broken: bool,
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("lease_id", &self.lease_id)
            .field("generation", &self.generation.id)
            .field("released", &self.released)
            .field("broken", &self.broken)
            .finish()
    }
}

impl PooledConnection {
    pub fn lease_id(&self) -> u64 {
        self.lease_id
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn target(&self) -> &DatabaseTarget {
        self.generation.connector.target()
    }

    /// Execute a fully formatted statement on this lease
    pub async fn execute(&mut self, statement: &str) -> DatabaseResult<QueryOutput> {
        let session = self.session.as_mut().ok_or_else(|| {
            DatabaseError::ConnectionLost("connection was already released".to_string())
        })?;

        let result = session.execute(statement).await;
        if let Err(e) = &result {
            if e.is_connection_lost() {
                self.broken = true;
            }
        }
        result
    }

    /// Give the lease back. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            warn!(
                lease_id = self.lease_id,
                "Connection released more than once, ignoring"
            );
            return false;
        }
        self.finish();
        true
    }

    fn finish(&mut self) {
        self.released = true;

        if let Some(session) = self.session.take() {
            if self.broken {
                close_in_background(vec![session]);
            } else if let Some(rejected) = self.generation.put_back(session) {
                close_in_background(vec![rejected]);
            }
        }

        // dropping the permit wakes the next waiter
        self.permit.take();
        let outstanding = self.shared.lease_ended();
        trace!(lease_id = self.lease_id, outstanding, "Connection released");
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if !self.released {
            self.finish();
        }
    }
}
