//! Transport statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time transport statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportStats {
    /// Records persisted
    pub records_written: u64,
    /// Records whose write failed
    pub records_failed: u64,
    /// Records dropped by the level filter or silent mode
    pub records_skipped: u64,
    /// Queries that returned rows
    pub queries: u64,
    /// Queries that failed
    pub query_failures: u64,
    /// Total insert duration (milliseconds)
    pub total_write_time_ms: u64,
    /// Average records per second while writing
    pub records_per_second: f64,
}

/// Atomic transport statistics
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicTransportStats {
    pub records_written: AtomicU64,
    pub records_failed: AtomicU64,
    pub records_skipped: AtomicU64,
    pub queries: AtomicU64,
    pub query_failures: AtomicU64,
    pub total_write_time_ms: AtomicU64,
}

impl AtomicTransportStats {
    /// Record a persisted record
    pub fn record_write(&self, duration: Duration) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.total_write_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a failed write
    pub fn record_write_failure(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record that never reached the store
    pub fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a query outcome
    pub fn record_query(&self, ok: bool) {
        if ok {
            self.queries.fetch_add(1, Ordering::Relaxed);
        } else {
            self.query_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> TransportStats {
        let records = self.records_written.load(Ordering::Relaxed);
        let time_ms = self.total_write_time_ms.load(Ordering::Relaxed);
        let rps = if time_ms > 0 {
            (records as f64 * 1000.0) / time_ms as f64
        } else {
            0.0
        };

        TransportStats {
            records_written: records,
            records_failed: self.records_failed.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            query_failures: self.query_failures.load(Ordering::Relaxed),
            total_write_time_ms: time_ms,
            records_per_second: rps,
        }
    }
}
