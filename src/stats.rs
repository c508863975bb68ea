//! Statistics tracking for the DNS server.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic request counters, shared by every handler task.
pub struct Stats {
    pub requests: AtomicU64,
    pub answered: AtomicU64,
    pub empty: AtomicU64,
    pub dropped: AtomicU64,
    pub send_failures: AtomicU64,
    /// Cumulative handling time in microseconds for averaging.
    total_response_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            answered: AtomicU64::new(0),
            empty: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    pub fn record_answered(&self, response_time_ms: f64) {
        self.record(&self.answered, response_time_ms);
    }

    pub fn record_empty(&self, response_time_ms: f64) {
        self.record(&self.empty, response_time_ms);
    }

    pub fn record_dropped(&self, response_time_ms: f64) {
        self.record(&self.dropped, response_time_ms);
    }

    /// Counted on top of the answered/empty outcome that produced the reply.
    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, outcome: &AtomicU64, response_time_ms: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        outcome.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add((response_time_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let requests = self.requests.swap(0, Ordering::Relaxed);
        let answered = self.answered.swap(0, Ordering::Relaxed);
        let empty = self.empty.swap(0, Ordering::Relaxed);
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        let send_failures = self.send_failures.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);

        let avg_response_ms = if requests > 0 {
            (total_us as f64 / requests as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            requests,
            answered,
            empty,
            dropped,
            send_failures,
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
    pub answered: u64,
    pub empty: u64,
    pub dropped: u64,
    pub send_failures: u64,
    pub avg_response_ms: f64,
}
