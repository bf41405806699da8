//! Per-sink counters
//!
//! Read by the broadcast loop at shutdown and by tests; the Prometheus side
//! goes through `observability::record_sink_publish`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for one cloud sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    published: AtomicU64,
    failures: AtomicU64,
    /// Snapshots refused because the sink queue was full
    dropped: AtomicU64,
    /// Snapshots not queued because the sink was disconnected
    skipped: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn inc_write_count(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn inc_skipped_count(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            published: self.write_count(),
            failures: self.failure_count(),
            dropped: self.dropped_count(),
            skipped: self.skipped_count(),
        }
    }
}

/// Copy of [`SinkMetrics`] for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub published: u64,
    pub failures: u64,
    pub dropped: u64,
    pub skipped: u64,
}
