//! Cached Food Records
//!
//! Immutable nutrition entries as they are stored in the durable log and
//! returned to clients.
//!
//! # Design
//!
//! - Identity is the FoodData Central id (`fdcId`); equality and hashing
//!   ignore every other field
//! - Optional fields are omitted from the serialized form, so a log line
//!   only carries what the provider actually returned

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Primary key of a cached record
pub type FoodId = u64;

/// A single nutrient value attached to a food
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nutrient {
    /// Nutrient number as published by FoodData Central (e.g. "208")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Human readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Amount per 100g
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Unit of `amount` (G, MG, KCAL, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
}

impl Nutrient {
    /// Create a fully populated nutrient
    pub fn new(
        number: impl Into<String>,
        name: impl Into<String>,
        amount: f64,
        unit_name: impl Into<String>,
    ) -> Self {
        Self {
            number: Some(number.into()),
            name: Some(name.into()),
            amount: Some(amount),
            unit_name: Some(unit_name.into()),
        }
    }
}

/// A cached food record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    /// Primary id
    pub fdc_id: FoodId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub food_nutrients: Vec<Nutrient>,
    /// Barcode (GTIN/UPC), only present on branded foods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gtin_upc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    /// Keyword search that produced this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Food {
    /// Create a bare record with only its id set
    pub fn new(fdc_id: FoodId) -> Self {
        Self {
            fdc_id,
            data_type: None,
            description: None,
            food_nutrients: Vec::new(),
            gtin_upc: None,
            ingredients: None,
            query: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the barcode
    pub fn with_gtin_upc(mut self, gtin_upc: impl Into<String>) -> Self {
        self.gtin_upc = Some(gtin_upc.into());
        self
    }

    /// Tag the record with the keyword search it came from
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Append a nutrient
    pub fn with_nutrient(mut self, nutrient: Nutrient) -> Self {
        self.food_nutrients.push(nutrient);
        self
    }

    /// Barcode, if the record has a non-blank one
    pub fn barcode(&self) -> Option<&str> {
        self.gtin_upc.as_deref().filter(|b| !b.trim().is_empty())
    }

    /// Keyword, if the record has a non-blank one
    pub fn keyword(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }

    /// Serialize to a single log line (without the trailing newline)
    pub fn to_line(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a single log line
    pub fn from_line(line: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(line)?)
    }

    /// Parse a single log line from raw bytes
    pub fn from_slice(line: &[u8]) -> crate::error::Result<Self> {
        Ok(serde_json::from_slice(line)?)
    }
}

impl PartialEq for Food {
    fn eq(&self, other: &Self) -> bool {
        self.fdc_id == other.fdc_id
    }
}

impl Eq for Food {}

impl Hash for Food {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fdc_id.hash(state);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CHEDDAR_LINE: &str = r#"{"fdcId":2015943,"dataType":"Branded","description":"CHEDDAR CHEESE","foodNutrients":[{"number":"203","name":"Protein","amount":25.0,"unitName":"G"},{"number":"208","name":"Energy","amount":393.0,"unitName":"KCAL"}],"gtinUpc":"75925306223","ingredients":"CHEDDAR CHEESE, POTATO STARCH","query":"cheddar cheese"}"#;

    #[test]
    fn test_equality_is_by_id_only() {
        let a = Food::new(1).with_description("apple");
        let b = Food::new(1).with_description("something else");
        let c = Food::new(2).with_description("apple");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_parse_log_line() {
        let food = Food::from_line(CHEDDAR_LINE).unwrap();

        assert_eq!(food.fdc_id, 2015943);
        assert_eq!(food.barcode(), Some("75925306223"));
        assert_eq!(food.keyword(), Some("cheddar cheese"));
        assert_eq!(food.food_nutrients.len(), 2);
        assert_eq!(food.food_nutrients[1].unit_name.as_deref(), Some("KCAL"));
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let line = Food::new(42).with_description("kiwi").to_line().unwrap();
        assert_eq!(line, r#"{"fdcId":42,"description":"kiwi"}"#);
    }

    #[test]
    fn test_blank_keys_are_ignored() {
        let food = Food::new(7).with_gtin_upc("  ").with_query("");
        assert_eq!(food.barcode(), None);
        assert_eq!(food.keyword(), None);
    }
}
