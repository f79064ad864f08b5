//! Cache Index
//!
//! In-memory lookup structures over cached records: by primary id, by
//! barcode, and by the keyword search that produced them.
//!
//! # Design
//!
//! - Primary and barcode maps are `DashMap`s (sharded, lock-free reads)
//! - Keyword lists live behind one dedicated mutex; appending to a list and
//!   reading it both happen under that mutex, so a reader never sees a list
//!   in the middle of an append
//! - Every insert is first-write-wins; nothing is ever evicted

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::record::{Food, FoodId};

/// Three-way index over cached records
pub struct CacheIndex {
    /// id -> record
    records: DashMap<FoodId, Arc<Food>>,
    /// barcode -> id
    barcodes: DashMap<String, FoodId>,
    /// keyword -> ids, in insertion order, duplicates kept
    keywords: Mutex<HashMap<String, Vec<FoodId>>>,
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self {
            records: DashMap::new(),
            barcodes: DashMap::new(),
            keywords: Mutex::new(HashMap::new()),
        }
    }
}

impl CacheIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one record.
    ///
    /// Returns `true` if the record's id was not indexed before. The keyword
    /// list is appended to even when the id is already known.
    pub fn store(&self, food: &Food) -> bool {
        let id = food.fdc_id;

        // Primary entry goes first: a keyword or barcode hit must always
        // resolve to a record.
        let inserted = match self.records.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(food.clone()));
                true
            }
        };

        if let Some(barcode) = food.barcode() {
            self.barcodes.entry(barcode.to_string()).or_insert(id);
        }

        if let Some(keyword) = food.keyword() {
            let mut keywords = self.keywords.lock();
            keywords.entry(keyword.to_string()).or_default().push(id);
        }

        inserted
    }

    /// Look up a record by primary id
    pub fn by_id(&self, id: FoodId) -> Option<Arc<Food>> {
        self.records.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Look up a record by barcode
    pub fn by_barcode(&self, barcode: &str) -> Option<Arc<Food>> {
        let id = *self.barcodes.get(barcode)?.value();
        self.by_id(id)
    }

    /// Look up every record stored under a keyword, in insertion order
    pub fn by_keyword(&self, keyword: &str) -> Option<Vec<Arc<Food>>> {
        let ids = self.keyword_ids(keyword)?;
        Some(ids.into_iter().filter_map(|id| self.by_id(id)).collect())
    }

    /// Raw id list for a keyword (copied under the keyword mutex)
    pub fn keyword_ids(&self, keyword: &str) -> Option<Vec<FoodId>> {
        self.keywords.lock().get(keyword).cloned()
    }

    /// Number of distinct records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the index holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ordered copy of the whole index, with keyword lists sorted so two
    /// snapshots compare equal regardless of ingestion interleaving.
    pub fn snapshot(&self) -> IndexSnapshot {
        let records = self
            .records
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect();
        let barcodes = self
            .barcodes
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect();
        let keywords = self
            .keywords
            .lock()
            .iter()
            .map(|(k, ids)| {
                let mut ids = ids.clone();
                ids.sort_unstable();
                (k.clone(), ids)
            })
            .collect();

        IndexSnapshot {
            records,
            barcodes,
            keywords,
        }
    }
}

/// Point-in-time copy of a [`CacheIndex`]
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    pub records: BTreeMap<FoodId, Arc<Food>>,
    pub barcodes: BTreeMap<String, FoodId>,
    /// Keyword lists, sorted
    pub keywords: BTreeMap<String, Vec<FoodId>>,
}

// =============================================================================
// Tests
// =============================================================================
