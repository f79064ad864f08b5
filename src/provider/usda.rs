//! USDA FoodData Central Provider
//!
//! Blocking HTTP client for the FoodData Central REST API.
//!
//! # Design
//!
//! - Single food lookups ask for the abridged format restricted to the
//!   tracked nutrients, so the response is already small
//! - Search results carry every nutrient in the full form; those are
//!   filtered down to the tracked set while parsing
//! - Bodies are parsed into a `serde_json::Value` first: search results
//!   occasionally repeat a key, which a derived struct would reject

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{FoodProvider, SearchPage};
use crate::cache::{Food, FoodId, Nutrient};
use crate::error::{Error, Result};

/// Public FoodData Central endpoint
pub const DEFAULT_USDA_URL: &str = "https://api.nal.usda.gov/fdc/v1";

/// Protein, fat, carbohydrate, energy, fiber
pub const TRACKED_NUTRIENTS: [&str; 5] = ["203", "204", "205", "208", "291"];

// Order the abridged endpoint is asked for them in
const FOOD_NUTRIENT_PARAMS: [u16; 5] = [205, 204, 291, 208, 203];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the USDA provider
#[derive(Debug, Clone)]
pub struct UsdaConfig {
    /// API base URL, without a trailing slash
    pub base_url: String,

    /// data.gov API key
    pub api_key: String,

    /// Timeout applied to every request
    pub request_timeout: Duration,

    /// Results per search page
    pub page_size: u32,
}

impl Default for UsdaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_USDA_URL.to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(30),
            page_size: 10,
        }
    }
}

impl UsdaConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("USDA API key is not set".into()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Provider
// =============================================================================

/// FoodData Central client
pub struct UsdaProvider {
    config: UsdaConfig,
    client: Client,
}

impl UsdaProvider {
    /// Create a provider. Must not be called from inside an async runtime.
    pub fn new(config: UsdaConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &UsdaConfig {
        &self.config
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn food_url(&self, fdc_id: FoodId) -> String {
        let mut url = format!(
            "{}/food/{}?api_key={}&format=abridged",
            self.base(),
            fdc_id,
            urlencoding::encode(&self.config.api_key)
        );
        for number in FOOD_NUTRIENT_PARAMS {
            url.push_str(&format!("&nutrients={}", number));
        }
        url
    }

    fn search_url(&self, keywords: &[String], page: u32) -> String {
        let query = keywords
            .iter()
            .map(|k| urlencoding::encode(k).into_owned())
            .collect::<Vec<_>>()
            .join("%20");

        format!(
            "{}/foods/search?api_key={}&query={}&requireAllWords=true&pageSize={}&pageNumber={}",
            self.base(),
            urlencoding::encode(&self.config.api_key),
            query,
            self.config.page_size,
            page
        )
    }

    /// GET `url`, mapping the status to a parsed body, `None`, or an error
    fn get(&self, url: &str) -> Result<Option<serde_json::Value>> {
        let response = self.client.get(url).send()?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json()?)),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::BAD_REQUEST => Err(Error::Upstream {
                status: 400,
                reason: "Bad input parameter".into(),
            }),
            status => {
                warn!(status = status.as_u16(), "Unexpected status from FoodData Central");
                Err(Error::Upstream {
                    status: status.as_u16(),
                    reason: "Unknown HTTP request error".into(),
                })
            }
        }
    }
}

impl FoodProvider for UsdaProvider {
    #[instrument(skip(self))]
    fn food(&self, fdc_id: FoodId) -> Result<Option<Food>> {
        let Some(body) = self.get(&self.food_url(fdc_id))? else {
            debug!("Food not found upstream");
            return Ok(None);
        };
        parse_food(body).map(Some)
    }

    #[instrument(skip(self))]
    fn search(&self, keywords: &[String], page: u32) -> Result<Option<SearchPage>> {
        let Some(body) = self.get(&self.search_url(keywords, page))? else {
            debug!("Search page not found upstream");
            return Ok(None);
        };
        let page = parse_search(body)?;
        debug!(
            total_hits = page.total_hits,
            total_pages = page.total_pages,
            foods = page.foods.len(),
            "Fetched search page"
        );
        Ok(Some(page))
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFood {
    fdc_id: FoodId,
    #[serde(default)]
    data_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<WireNutrient>,
    #[serde(default)]
    gtin_upc: Option<String>,
    #[serde(default)]
    ingredients: Option<String>,
}

/// Nutrients come in one of two shapes depending on the endpoint
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireNutrient {
    #[serde(rename_all = "camelCase")]
    Full {
        #[allow(dead_code)]
        nutrient_id: serde_json::Value,
        #[serde(default)]
        nutrient_name: Option<String>,
        #[serde(default)]
        nutrient_number: Option<NutrientNumber>,
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        unit_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Abridged {
        number: NutrientNumber,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        amount: Option<f64>,
        #[serde(default)]
        unit_name: Option<String>,
    },
    Other(#[allow(dead_code)] serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NutrientNumber {
    Text(String),
    Number(serde_json::Number),
}

impl NutrientNumber {
    fn into_string(self) -> String {
        match self {
            NutrientNumber::Text(s) => s,
            NutrientNumber::Number(n) => n.to_string(),
        }
    }
}

impl WireNutrient {
    fn into_nutrient(self) -> Option<Nutrient> {
        match self {
            WireNutrient::Full {
                nutrient_name,
                nutrient_number,
                value,
                unit_name,
                ..
            } => {
                let number = nutrient_number?.into_string();
                if !TRACKED_NUTRIENTS.contains(&number.as_str()) {
                    return None;
                }
                Some(Nutrient {
                    number: Some(number),
                    name: nutrient_name,
                    amount: value,
                    unit_name,
                })
            }
            WireNutrient::Abridged {
                number,
                name,
                amount,
                unit_name,
            } => Some(Nutrient {
                number: Some(number.into_string()),
                name,
                amount,
                unit_name,
            }),
            WireNutrient::Other(_) => None,
        }
    }
}

impl From<WireFood> for Food {
    fn from(wire: WireFood) -> Self {
        Food {
            fdc_id: wire.fdc_id,
            data_type: wire.data_type,
            description: wire.description,
            food_nutrients: wire
                .food_nutrients
                .into_iter()
                .filter_map(WireNutrient::into_nutrient)
                .collect(),
            gtin_upc: wire.gtin_upc,
            ingredients: wire.ingredients,
            query: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSearch {
    #[serde(default)]
    food_search_criteria: Option<WireCriteria>,
    #[serde(default)]
    total_hits: u64,
    #[serde(default = "first_page")]
    current_page: u32,
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    foods: Vec<WireFood>,
}

#[derive(Debug, Deserialize)]
struct WireCriteria {
    #[serde(default)]
    query: Option<String>,
}

fn first_page() -> u32 {
    1
}

fn parse_food(body: serde_json::Value) -> Result<Food> {
    let wire: WireFood = serde_json::from_value(body)
        .map_err(|e| Error::UnexpectedResponse(format!("food: {}", e)))?;
    Ok(wire.into())
}

fn parse_search(body: serde_json::Value) -> Result<SearchPage> {
    let wire: WireSearch = serde_json::from_value(body)
        .map_err(|e| Error::UnexpectedResponse(format!("search: {}", e)))?;

    Ok(SearchPage {
        query: wire.food_search_criteria.and_then(|c| c.query),
        total_hits: wire.total_hits,
        current_page: wire.current_page,
        total_pages: wire.total_pages,
        foods: wire.foods.into_iter().map(Food::from).collect(),
    })
}

// =============================================================================
// Tests
// =============================================================================
