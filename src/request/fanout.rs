//! Pagination Fan-out
//!
//! Fetches the remaining pages of a keyword search concurrently, one scoped
//! thread per page, and joins them back in page order.

use std::thread;

use tracing::{debug, warn};

use crate::cache::Food;
use crate::error::{Error, Result};
use crate::provider::{FoodProvider, SearchPage};

/// Page numbers still to fetch after `first`, capped at `max_pages`
#[allow(clippy::reversed_empty_ranges)]
pub fn remaining_pages(first: &SearchPage, max_pages: u32) -> std::ops::RangeInclusive<u32> {
    if !first.has_more() {
        return 1..=0;
    }
    let last = first.total_pages.min(max_pages);
    (first.current_page + 1)..=last
}

/// Fetch every remaining page and return their foods in page order.
///
/// All pages are awaited even after one fails; the first failure in page
/// order is returned and no foods are.
pub fn fetch_remaining(
    provider: &dyn FoodProvider,
    keywords: &[String],
    first: &SearchPage,
    max_pages: u32,
) -> Result<Vec<Food>> {
    let pages = remaining_pages(first, max_pages);
    if pages.is_empty() {
        return Ok(Vec::new());
    }
    debug!(from = pages.start(), to = pages.end(), "Fanning out page fetches");

    thread::scope(|scope| {
        let handles: Vec<_> = pages
            .map(|page| (page, scope.spawn(move || provider.search(keywords, page))))
            .collect();

        let mut foods = Vec::new();
        let mut failure = None;

        for (page, handle) in handles {
            let fetched = handle
                .join()
                .unwrap_or_else(|_| Err(Error::Internal(format!("fetch of page {} panicked", page))));

            match fetched {
                Ok(Some(result)) => {
                    if failure.is_none() {
                        foods.extend(result.foods);
                    }
                }
                Ok(None) => {
                    failure.get_or_insert(Error::Upstream {
                        status: 404,
                        reason: format!("page {} vanished", page),
                    });
                }
                Err(e) => {
                    warn!(page, "Page fetch failed: {}", e);
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(foods),
        }
    })
}

// =============================================================================
// Tests
// =============================================================================
