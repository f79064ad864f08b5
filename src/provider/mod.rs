//! Food Data Providers
//!
//! The upstream source consulted on a cache miss. Calls are synchronous and
//! run on worker threads, never on the reactor.

mod usda;

pub use usda::{UsdaConfig, UsdaProvider, DEFAULT_USDA_URL, TRACKED_NUTRIENTS};

use crate::cache::{Food, FoodId};
use crate::error::Result;

/// One page of a keyword search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Query string as echoed by the provider
    pub query: Option<String>,
    pub total_hits: u64,
    /// 1-based page number
    pub current_page: u32,
    pub total_pages: u32,
    pub foods: Vec<Food>,
}

impl SearchPage {
    /// Whether pages beyond this one exist
    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Upstream food data source.
///
/// `Ok(None)` means the provider answered that nothing exists; every other
/// failure is an `Err`.
pub trait FoodProvider: Send + Sync {
    /// Fetch a single food by id
    fn food(&self, fdc_id: FoodId) -> Result<Option<Food>>;

    /// Fetch one page (1-based) of a keyword search requiring all words
    fn search(&self, keywords: &[String], page: u32) -> Result<Option<SearchPage>>;
}
