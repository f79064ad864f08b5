//! Durable Food Cache
//!
//! Multi-index record cache backed by an append-only log, fed through a
//! producer/consumer persistence pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                             FoodCache                                     │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  request handlers ──submit──▶ IngestionQueue ──next_pending──▶ writers   │
//! │                                (Mutex+Condvar)                (W threads) │
//! │                                                                   │       │
//! │                        ┌──────────── store ───────────────────────┤       │
//! │                        ▼                                          ▼       │
//! │  ┌──────────────────────────────────────┐        ┌──────────────────────┐ │
//! │  │ CacheIndex                            │        │ DurableLog           │ │
//! │  │  id → Food        (DashMap)           │        │ JSON lines, append + │ │
//! │  │  barcode → id     (DashMap)           │        │ flush under one lock │ │
//! │  │  keyword → [id]   (Mutex<HashMap>)    │        └──────────────────────┘ │
//! │  └──────────────────────────────────────┘                 │               │
//! │                        ▲────────────── replay on open ─────┘               │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - First write wins for ids and barcodes; keyword lists only grow
//! - Nothing is evicted; the log is the source of truth
//! - Shutdown drains: every record queued before `close` reaches the log

mod index;
mod journal;
mod manager;
mod metrics;
mod queue;
mod record;
mod writer;

pub use index::{CacheIndex, IndexSnapshot};
pub use journal::{replay_file, DurableLog, RecordSink, ReplayStats};
pub use manager::{CacheConfig, FoodCache};
pub use metrics::{CacheMetrics, CacheStats};
pub use queue::IngestionQueue;
pub use record::{Food, FoodId, Nutrient};
pub use writer::{WriterContext, WriterPool};

/// Default number of writer threads
pub const DEFAULT_WRITER_THREADS: usize = 4;

/// Default durable log location
pub const DEFAULT_LOG_PATH: &str = "./data/cache.jsonl";
