//! Metrics collection for the query layer
//!
//! This module defines and manages Prometheus metrics for query execution and
//! the result cache.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Duration;

lazy_static! {
    // Query Metrics

    /// Statements executed by dialect and outcome
    pub static ref QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "soundshelf_queries_total",
        "Total number of statements sent to the backend",
        &["dialect", "outcome"]
    )
    .expect("Failed to register QUERIES_TOTAL");

    /// Statement duration in seconds
    pub static ref QUERY_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "soundshelf_query_duration_seconds",
        "Backend statement duration in seconds",
        &["dialect"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    )
    .expect("Failed to register QUERY_DURATION_SECONDS");

    // Cache Metrics

    /// Cache lookups by result (hit, miss, expired)
    pub static ref CACHE_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "soundshelf_cache_lookups_total",
        "Total number of result cache lookups",
        &["result"]
    )
    .expect("Failed to register CACHE_LOOKUPS_TOTAL");

    /// Entries removed by explicit invalidation
    pub static ref CACHE_INVALIDATIONS_TOTAL: IntCounter = register_int_counter!(
        "soundshelf_cache_invalidations_total",
        "Total number of cache entries removed by invalidation"
    )
    .expect("Failed to register CACHE_INVALIDATIONS_TOTAL");

    /// Live cache entries
    pub static ref CACHE_ENTRIES: IntGauge = register_int_gauge!(
        "soundshelf_cache_entries",
        "Number of entries currently held by the result cache"
    )
    .expect("Failed to register CACHE_ENTRIES");
}

/// Record one backend round-trip.
pub fn record_query(dialect: &str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    QUERIES_TOTAL.with_label_values(&[dialect, outcome]).inc();
    QUERY_DURATION_SECONDS
        .with_label_values(&[dialect])
        .observe(elapsed.as_secs_f64());
}

/// Cache lookup outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    Expired,
}

impl CacheLookup {
    fn label(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Expired => "expired",
        }
    }
}

pub fn record_cache_lookup(lookup: CacheLookup) {
    CACHE_LOOKUPS_TOTAL
        .with_label_values(&[lookup.label()])
        .inc();
}

pub fn record_invalidations(removed: usize) {
    CACHE_INVALIDATIONS_TOTAL.inc_by(removed as u64);
}

pub fn set_cache_entries(entries: usize) {
    CACHE_ENTRIES.set(i64::try_from(entries).unwrap_or(i64::MAX));
}

/// Render every registered metric in the Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
