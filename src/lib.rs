//! nutricache - Durable Caching Proxy for USDA FoodData Central
//!
//! A TCP server that answers food lookups from a durable multi-index cache
//! and falls back to the FoodData Central API on a miss. Everything fetched
//! is queued, persisted to an append-only log by background writers, and
//! served from memory from then on.
//!
//! # Architecture
//!
//! ```text
//! Reactor (1 thread) → Workers (M threads) → Cache ← Writers (W threads)
//!                                   ↓                      ↓
//!                            FoodData Central         Durable log
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Indexes, ingestion queue, writer pool and durable log
//! - [`error`] - Error types
//! - [`provider`] - Upstream food data sources
//! - [`request`] - Command parsing, request handling and replies
//! - [`server`] - Socket reactor and request worker pool

pub mod cache;
pub mod error;
pub mod provider;
pub mod request;
pub mod server;

// Re-export commonly used types
pub use cache::{CacheConfig, Food, FoodCache, FoodId, Nutrient};
pub use error::{Error, Result};
pub use provider::{FoodProvider, SearchPage, UsdaConfig, UsdaProvider};
pub use request::{Command, HandlerConfig, RequestHandler, Response};
pub use server::{Server, ServerConfig};
