//! Observability metrics for quad stores.
//!
//! Lightweight lock-free counters suitable for production monitoring,
//! exportable in the Prometheus text format.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics collected by a store for observability.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Total number of read queries driven to completion.
    pub queries_total: AtomicU64,
    /// Total number of read queries that surfaced an error.
    pub query_errors_total: AtomicU64,
    /// Sum of query durations in milliseconds.
    pub query_duration_sum_ms: AtomicU64,
    /// Total number of quads added.
    pub adds_total: AtomicU64,
    /// Total number of quads deleted.
    pub deletes_total: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed read query.
    pub fn record_query(&self, duration_ms: u64, error: bool) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.query_duration_sum_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
        if error {
            self.query_errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records quad additions.
    pub fn record_adds(&self, count: u64) {
        self.adds_total.fetch_add(count, Ordering::Relaxed);
    }

    /// Records quad deletions.
    pub fn record_deletes(&self, count: u64) {
        self.deletes_total.fetch_add(count, Ordering::Relaxed);
    }

    /// Exports the counters in the Prometheus text format.
    pub fn to_prometheus_format(&self) -> String {
        let queries = self.queries_total.load(Ordering::Relaxed);
        let errors = self.query_errors_total.load(Ordering::Relaxed);
        let duration = self.query_duration_sum_ms.load(Ordering::Relaxed);
        let adds = self.adds_total.load(Ordering::Relaxed);
        let deletes = self.deletes_total.load(Ordering::Relaxed);

        format!(
            "# HELP quiver_queries_total Total number of read queries\n\
             # TYPE quiver_queries_total counter\n\
             quiver_queries_total {queries}\n\
             # HELP quiver_query_errors_total Total number of failed read queries\n\
             # TYPE quiver_query_errors_total counter\n\
             quiver_query_errors_total {errors}\n\
             # HELP quiver_query_duration_sum_ms Sum of query durations in milliseconds\n\
             # TYPE quiver_query_duration_sum_ms counter\n\
             quiver_query_duration_sum_ms {duration}\n\
             # HELP quiver_adds_total Total number of quads added\n\
             # TYPE quiver_adds_total counter\n\
             quiver_adds_total {adds}\n\
             # HELP quiver_deletes_total Total number of quads deleted\n\
             # TYPE quiver_deletes_total counter\n\
             quiver_deletes_total {deletes}\n"
        )
    }
}

/// Measures the wall-clock duration of one query for [`StoreMetrics::record_query`].
#[derive(Debug, Clone, Copy)]
pub struct QueryTimer {
    start: Instant,
}

impl QueryTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the timer started.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = StoreMetrics::new();
        metrics.record_query(12, false);
        metrics.record_query(30, true);
        metrics.record_adds(5);
        metrics.record_deletes(2);

        assert_eq!(metrics.queries_total.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.query_errors_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.query_duration_sum_ms.load(Ordering::Relaxed), 42);

        let text = metrics.to_prometheus_format();
        assert!(text.contains("quiver_adds_total 5"));
        assert!(text.contains("quiver_deletes_total 2"));
    }
}
