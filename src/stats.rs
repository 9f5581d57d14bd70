//! Statistics tracking for the DNS proxy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::resolver::Source;

/// Atomic counters, reset each time they are summarized.
pub struct Stats {
    pub requests: AtomicU64,
    pub overrides: AtomicU64,
    pub cached: AtomicU64,
    pub upstream: AtomicU64,
    pub failed: AtomicU64,
    /// Queries answered empty without resolution (non-`A` types).
    pub unsupported: AtomicU64,
    /// Cumulative response time in microseconds for averaging.
    total_response_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            overrides: AtomicU64::new(0),
            cached: AtomicU64::new(0),
            upstream: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            unsupported: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    pub fn record(&self, source: Source, failed: bool, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let counter = match source {
            Source::Override => &self.overrides,
            Source::Cache => &self.cached,
            Source::Upstream => &self.upstream,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_response_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_unsupported(&self, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.unsupported.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let requests = self.requests.swap(0, Ordering::Relaxed);
        let overrides = self.overrides.swap(0, Ordering::Relaxed);
        let cached = self.cached.swap(0, Ordering::Relaxed);
        let upstream = self.upstream.swap(0, Ordering::Relaxed);
        let failed = self.failed.swap(0, Ordering::Relaxed);
        let unsupported = self.unsupported.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);

        let avg_response_ms = if requests > 0 {
            (total_us as f64 / requests as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            requests,
            overrides,
            cached,
            upstream,
            failed,
            unsupported,
            avg_response_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StatsSnapshot {
    pub requests: u64,
    pub overrides: u64,
    pub cached: u64,
    pub upstream: u64,
    pub failed: u64,
    pub unsupported: u64,
    pub avg_response_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_counts_by_source_and_resets() {
        let stats = Stats::new();
        stats.record(Source::Cache, false, Duration::from_millis(1));
        stats.record(Source::Upstream, true, Duration::from_millis(3));
        stats.record(Source::Override, false, Duration::from_millis(2));
        stats.record_unsupported(Duration::from_millis(2));

        let snap = stats.snapshot_and_reset();
        assert_eq!(snap.requests, 4);
        assert_eq!(snap.unsupported, 1);
        assert_eq!(snap.cached, 1);
        assert_eq!(snap.upstream, 1);
        assert_eq!(snap.overrides, 1);
        assert_eq!(snap.failed, 1);
        assert!((snap.avg_response_ms - 2.0).abs() < 1e-9);

        let empty = stats.snapshot_and_reset();
        assert_eq!(empty.requests, 0);
        assert_eq!(empty.unsupported, 0);
        assert_eq!(empty.avg_response_ms, 0.0);
    }
}
