//! Cache Metrics Collection
//!
//! Lock-free counters for lookups and the persistence pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    // Lookups
    hits: AtomicU64,
    misses: AtomicU64,

    // Persistence pipeline
    submitted: AtomicU64,
    persisted: AtomicU64,
    writer_failures: AtomicU64,
    live_writers: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_submitted(&self, count: u64) {
        self.submitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_writer_started(&self) {
        self.live_writers.fetch_add(1, Ordering::Relaxed);
    }

    /// A writer left its loop; `failed` marks an abnormal exit
    pub fn record_writer_stopped(&self, failed: bool) {
        self.live_writers.fetch_sub(1, Ordering::Relaxed);
        if failed {
            self.writer_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    pub fn live_writers(&self) -> u64 {
        self.live_writers.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits(),
            misses: self.misses(),
            hit_ratio: self.hit_ratio(),
            submitted: self.submitted.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            writer_failures: self.writer_failures.load(Ordering::Relaxed),
            live_writers: self.live_writers(),
        }
    }
}

/// Snapshot of all cache metrics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub submitted: u64,
    pub persisted: u64,
    pub writer_failures: u64,
    pub live_writers: u64,
}

// =============================================================================
// Tests
// =============================================================================
