//! Food Cache Manager
//!
//! Owns the index, the ingestion queue, the durable log and the writer pool,
//! and exposes the cache's public contract.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::index::CacheIndex;
use super::journal::{DurableLog, RecordSink};
use super::metrics::{CacheMetrics, CacheStats};
use super::queue::IngestionQueue;
use super::record::{Food, FoodId};
use super::writer::{WriterContext, WriterPool};
use super::{DEFAULT_LOG_PATH, DEFAULT_WRITER_THREADS};
use crate::error::{Error, Result};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Durable log location
    pub log_path: PathBuf,
    /// Number of writer threads
    pub writer_threads: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            writer_threads: DEFAULT_WRITER_THREADS,
        }
    }
}

impl CacheConfig {
    /// Default configuration over a specific log file
    pub fn at(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.writer_threads == 0 {
            return Err(Error::Config("writer_threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// Durable multi-index food cache
pub struct FoodCache {
    config: CacheConfig,
    index: Arc<CacheIndex>,
    queue: Arc<IngestionQueue>,
    log: Arc<DurableLog>,
    metrics: Arc<CacheMetrics>,
    writers: Mutex<Option<WriterPool>>,
}

impl FoodCache {
    /// Open the cache: replay the log into a fresh index, then start writers.
    ///
    /// Fails only if the configuration is invalid or the log cannot be
    /// opened or read.
    pub fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let log = Arc::new(DurableLog::open(&config.log_path)?);
        let index = Arc::new(CacheIndex::new());
        log.replay(&index)?;

        let queue = Arc::new(IngestionQueue::new());
        let metrics = Arc::new(CacheMetrics::new());

        let writers = WriterPool::spawn(
            config.writer_threads,
            WriterContext {
                queue: Arc::clone(&queue),
                index: Arc::clone(&index),
                sink: Arc::clone(&log) as Arc<dyn RecordSink>,
                metrics: Arc::clone(&metrics),
            },
        )?;

        info!(
            path = %config.log_path.display(),
            records = index.len(),
            writers = config.writer_threads,
            "Food cache opened"
        );

        Ok(Self {
            config,
            index,
            queue,
            log,
            metrics,
            writers: Mutex::new(Some(writers)),
        })
    }

    /// Open with default settings over `log_path`
    pub fn open_at(log_path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(CacheConfig::at(log_path))
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Queue one record for persistence. Ignored once the cache is closed.
    pub fn submit(&self, food: Food) -> bool {
        let accepted = self.queue.submit(food);
        if accepted {
            self.metrics.record_submitted(1);
        }
        accepted
    }

    /// Queue a batch of records, keeping their order
    pub fn submit_all<I>(&self, foods: I) -> usize
    where
        I: IntoIterator<Item = Food>,
    {
        let accepted = self.queue.submit_all(foods);
        self.metrics.record_submitted(accepted as u64);
        accepted
    }

    /// Apply one record to the index directly, bypassing the queue and log
    pub fn store_in_cache(&self, food: &Food) -> bool {
        self.index.store(food)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn lookup_by_id(&self, id: FoodId) -> Option<Arc<Food>> {
        self.observe(self.index.by_id(id))
    }

    pub fn lookup_by_barcode(&self, barcode: &str) -> Option<Arc<Food>> {
        self.observe(self.index.by_barcode(barcode))
    }

    pub fn lookup_by_keyword(&self, keyword: &str) -> Option<Vec<Arc<Food>>> {
        self.observe(self.index.by_keyword(keyword))
    }

    fn observe<T>(&self, found: Option<T>) -> Option<T> {
        match found {
            Some(_) => self.metrics.record_hit(),
            None => self.metrics.record_miss(),
        }
        found
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Stop accepting submissions and wake idle writers. Queued records are
    /// still persisted.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Close and wait for every writer to drain the queue and exit
    pub fn shutdown(&self) -> CacheStats {
        self.close();

        if let Some(writers) = self.writers.lock().take() {
            writers.join();
            let stats = self.metrics.snapshot();
            info!(
                persisted = stats.persisted,
                writer_failures = stats.writer_failures,
                hit_ratio = stats.hit_ratio,
                "Food cache shut down"
            );
        }
        self.metrics.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn index(&self) -> &CacheIndex {
        &self.index
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }
}

impl Drop for FoodCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_cache_rejects_zero_writers() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            log_path: dir.path().join("cache.jsonl"),
            writer_threads: 0,
        };

        assert_matches!(FoodCache::open(config).err(), Some(Error::Config(_)));
    }

    #[test]
    fn test_cache_submit_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FoodCache::open_at(dir.path().join("cache.jsonl")).unwrap();

        cache.submit(Food::new(10).with_gtin_upc("555").with_query("apple"));
        cache.submit_all(vec![Food::new(11).with_query("apple")]);
        let stats = cache.shutdown();

        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.persisted, 2);
        assert_eq!(cache.lookup_by_id(10).unwrap().fdc_id, 10);
        assert_eq!(cache.lookup_by_barcode("555").unwrap().fdc_id, 10);
        assert_eq!(cache.lookup_by_keyword("apple").unwrap().len(), 2);
    }

    #[test]
    fn test_cache_lookup_misses_are_not_errors() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FoodCache::open_at(dir.path().join("cache.jsonl")).unwrap();

        assert!(cache.lookup_by_id(788888).is_none());
        assert!(cache.lookup_by_barcode("27318213").is_none());
        assert!(cache.lookup_by_keyword("kiwi").is_none());
        assert_eq!(cache.metrics().misses(), 3);
    }

    #[test]
    fn test_cache_ignores_submissions_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FoodCache::open_at(dir.path().join("cache.jsonl")).unwrap();

        cache.close();
        assert!(cache.is_closed());
        assert!(!cache.submit(Food::new(1)));

        cache.shutdown();
        assert!(cache.lookup_by_id(1).is_none());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FoodCache::open_at(dir.path().join("cache.jsonl")).unwrap();

        cache.submit(Food::new(1));
        let first = cache.shutdown();
        let second = cache.shutdown();
        assert_eq!(first.persisted, second.persisted);
    }
}
