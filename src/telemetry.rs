//! Metric names and recording helpers for the `metrics` facade
//!
//! Nothing is exported unless the host application installs a recorder.

use crate::statement::StatementKind;
use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};
use std::sync::Once;

pub const METRIC_QUERIES_TOTAL: &str = "sqlcache_queries_total";
pub const METRIC_HIT_TOTAL: &str = "sqlcache_hit_total";
pub const METRIC_MISS_TOTAL: &str = "sqlcache_miss_total";
pub const METRIC_STATEMENT_TOTAL: &str = "sqlcache_statement_total";
pub const METRIC_ERROR_TOTAL: &str = "sqlcache_error_total";
pub const METRIC_POOL_OUTSTANDING: &str = "sqlcache_pool_outstanding";

static METRIC_DESCRIPTIONS: Once = Once::new();

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_QUERIES_TOTAL,
            Unit::Count,
            "Total number of statements received."
        );
        describe_counter!(
            METRIC_HIT_TOTAL,
            Unit::Count,
            "Select statements answered from the cache."
        );
        describe_counter!(
            METRIC_MISS_TOTAL,
            Unit::Count,
            "Select statements that went to the database."
        );
        describe_counter!(
            METRIC_STATEMENT_TOTAL,
            Unit::Count,
            "Statements received, labelled by leading keyword."
        );
        describe_counter!(
            METRIC_ERROR_TOTAL,
            Unit::Count,
            "Statements that ended in an error."
        );
        describe_gauge!(
            METRIC_POOL_OUTSTANDING,
            Unit::Count,
            "Connections currently leased from the pool."
        );
    });
}

pub(crate) fn record_statement(kind: StatementKind) {
    counter!(METRIC_QUERIES_TOTAL).increment(1);
    counter!(METRIC_STATEMENT_TOTAL, "kind" => kind.as_str()).increment(1);
}

pub(crate) fn record_hit() {
    counter!(METRIC_HIT_TOTAL).increment(1);
}

pub(crate) fn record_miss() {
    counter!(METRIC_MISS_TOTAL).increment(1);
}

pub(crate) fn record_error() {
    counter!(METRIC_ERROR_TOTAL).increment(1);
}

pub(crate) fn record_pool_outstanding(outstanding: usize) {
    gauge!(METRIC_POOL_OUTSTANDING).set(outstanding as f64);
}
