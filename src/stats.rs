//! # Statistics
//!
//! Monotonic counters mutated by the orchestrator. Callers only ever see a
//! [`StatisticsSnapshot`].

use crate::statement::StatementKind;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Queries per second above which the report flags high load
pub const HIGH_QPS_THRESHOLD: u64 = 100;

#[derive(Debug, Default)]
pub struct Statistics {
    queries: AtomicU64,
    selects: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    other: AtomicU64,
    errors: AtomicU64,
    rate: RateWindow,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a received statement under its kind
    pub fn record_statement(&self, kind: StatementKind) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.rate.tick(Instant::now());
        let counter = match kind {
            StatementKind::Select => &self.selects,
            StatementKind::Insert => &self.inserts,
            StatementKind::Update => &self.updates,
            StatementKind::Delete => &self.deletes,
            StatementKind::Other => &self.other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Statements received during the last full second
    pub fn queries_per_second(&self) -> u64 {
        self.rate.last_full_second(Instant::now())
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            selects: self.selects.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            other: self.other.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            queries_per_second: self.queries_per_second(),
            pool_outstanding: 0,
            connection_limit: 0,
        }
    }
}

/// Point-in-time copy of the counters plus pool figures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub queries: u64,
    pub selects: u64,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub other: u64,
    pub errors: u64,
    pub queries_per_second: u64,
    pub pool_outstanding: usize,
    pub connection_limit: usize,
}

impl StatisticsSnapshot {
    /// Share of selects answered from the cache, 0.0 when nothing was selected
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }

    pub fn is_high_load(&self) -> bool {
        self.queries_per_second >= HIGH_QPS_THRESHOLD
    }

    pub fn pool_exhausted(&self) -> bool {
        self.connection_limit > 0 && self.pool_outstanding >= self.connection_limit
    }
}

/// One-second tumbling window
#[derive(Debug)]
struct RateWindow {
    origin: Instant,
    state: Mutex<RateState>,
}

#[derive(Debug, Default)]
struct RateState {
    second: u64,
    current: u64,
    previous: u64,
}

impl Default for RateWindow {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(RateState::default()),
        }
    }
}

impl RateWindow {
    fn second_of(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.origin).as_secs()
    }

    fn roll(state: &mut RateState, second: u64) {
        if second == state.second {
            return;
        }
        state.previous = if second == state.second + 1 {
            state.current
        } else {
            0
        };
        state.current = 0;
        state.second = second;
    }

    fn tick(&self, now: Instant) {
        let second = self.second_of(now);
        let mut state = self.state.lock();
        Self::roll(&mut state, second);
        state.current += 1;
    }

    fn last_full_second(&self, now: Instant) -> u64 {
        let second = self.second_of(now);
        let mut state = self.state.lock();
        Self::roll(&mut state, second);
        state.previous
    }
}
