//! Request Handler
//!
//! Turns one raw client request into one [`Response`]: parse, consult the
//! cache, fall back to the provider, and queue whatever was fetched.
//!
//! # Design
//!
//! - Cache first; the provider is only called on a miss
//! - Fetched records are queued for persistence, never stored inline
//! - Search results are tagged with the request's keyword string before
//!   they are queued, so the next identical search is a hit
//! - Barcode lookups are cache-only

use std::sync::Arc;

use tracing::{debug, warn};

use super::command::Command;
use super::fanout;
use super::response::Response;
use crate::cache::{Food, FoodCache, FoodId};
use crate::error::{Error, Result};
use crate::provider::FoodProvider;

/// Default cap on search pages fetched per request
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Handler configuration
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Highest search page fetched for one request
    pub max_pages: u32,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl HandlerConfig {
    fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(Error::Config("max_pages must be at least 1".into()));
        }
        Ok(())
    }
}

/// Shared request processor, called from every worker thread
pub struct RequestHandler {
    cache: Arc<FoodCache>,
    provider: Arc<dyn FoodProvider>,
    config: HandlerConfig,
}

impl RequestHandler {
    pub fn new(
        cache: Arc<FoodCache>,
        provider: Arc<dyn FoodProvider>,
        config: HandlerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache,
            provider,
            config,
        })
    }

    pub fn cache(&self) -> &FoodCache {
        &self.cache
    }

    /// Process raw request bytes. Never fails: every error becomes an error
    /// response for this client only.
    pub fn handle(&self, raw: &[u8]) -> Response {
        let text = String::from_utf8_lossy(raw);

        let command = match Command::parse(&text) {
            Ok(command) => command,
            Err(e) => {
                debug!("Rejected request: {}", e);
                return Response::invalid(&e);
            }
        };

        match self.execute(&command) {
            Ok(Some(response)) => response,
            Ok(None) => {
                debug!(%command, "No results");
                Response::not_found()
            }
            Err(e) if e.is_client_error() => Response::invalid(&e),
            Err(e) => {
                warn!(%command, "Request failed: {}", e);
                Response::server_error()
            }
        }
    }

    /// Run a parsed command; `Ok(None)` means nothing matched
    pub fn execute(&self, command: &Command) -> Result<Option<Response>> {
        match command {
            Command::GetFoodReport { fdc_id } => {
                Ok(self.food_report(*fdc_id)?.map(Response::ok_food))
            }
            Command::GetFoodByBarcode { gtin_upc } => Ok(self
                .cache
                .lookup_by_barcode(gtin_upc)
                .map(|food| Response::ok_food(Food::clone(&food)))),
            Command::GetFood { keywords } => Ok(self.search(keywords)?.map(Response::ok_foods)),
        }
    }

    fn food_report(&self, fdc_id: FoodId) -> Result<Option<Food>> {
        if let Some(food) = self.cache.lookup_by_id(fdc_id) {
            return Ok(Some(Food::clone(&food)));
        }

        let Some(food) = self.provider.food(fdc_id)? else {
            return Ok(None);
        };
        self.cache.submit(food.clone());
        Ok(Some(food))
    }

    fn search(&self, keywords: &[String]) -> Result<Option<Vec<Food>>> {
        let key = Command::keyword_key(keywords);

        // May be a prefix of a batch the writers are still indexing
        if let Some(foods) = self.cache.lookup_by_keyword(&key) {
            return Ok(Some(foods.iter().map(|f| Food::clone(f)).collect()));
        }

        let Some(mut first) = self.provider.search(keywords, 1)? else {
            return Ok(None);
        };
        if first.total_hits == 0 {
            return Ok(None);
        }
        debug!(
            keywords = %key,
            echoed = ?first.query,
            total_hits = first.total_hits,
            total_pages = first.total_pages,
            "Search missed the cache"
        );

        let rest = fanout::fetch_remaining(
            self.provider.as_ref(),
            keywords,
            &first,
            self.config.max_pages,
        )?;

        let foods: Vec<Food> = std::mem::take(&mut first.foods)
            .into_iter()
            .chain(rest)
            .map(|food| food.with_query(key.as_str()))
            .collect();

        let queued = self.cache.submit_all(foods.iter().cloned());
        debug!(keywords = %key, fetched = foods.len(), queued, "Search results queued");

        Ok(Some(foods))
    }
}

// =============================================================================
// Tests
// =============================================================================
