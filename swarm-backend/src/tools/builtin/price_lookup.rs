//! Spot price lookup against a CoinGecko-compatible `simple/price` endpoint.

use crate::tools::error::ToolError;
use crate::tools::http_retry::{endpoint_key, HttpRetryManager};
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolOutput,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Context setting that overrides the API base URL
pub const PRICE_API_URL_SETTING: &str = "price_api_url";
/// API key name looked up through `ToolContext::get_api_key`
pub const PRICE_API_KEY: &str = "PRICE_API_KEY";

const CACHE_TTL_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// usd quote per price id
pub type PriceTable = BTreeMap<String, f64>;

pub struct PriceLookupTool {
    definition: ToolDefinition,
    client: reqwest::Client,
    cache: RwLock<HashMap<String, (PriceTable, Instant)>>,
}

impl PriceLookupTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "ids".to_string(),
            PropertySchema::string_array(
                "Price ids to quote (e.g. 'ethereum', 'usd-coin'). Use token_lookup to find a token's price id.",
                "Price id",
            ),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("swarm-backend/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        PriceLookupTool {
            definition: ToolDefinition {
                name: "price_lookup".to_string(),
                description: "Get current USD prices for one or more assets.".to_string(),
                input_schema: ToolInputSchema::new(properties, &["ids"]).into(),
            },
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &str) -> Option<PriceTable> {
        let cache = self.cache.read();
        let (prices, at) = cache.get(key)?;
        (at.elapsed() < Duration::from_secs(CACHE_TTL_SECS)).then(|| prices.clone())
    }

    /// Insert a fresh entry and evict every expired one
    fn store(&self, key: String, prices: PriceTable) {
        let ttl = Duration::from_secs(CACHE_TTL_SECS);
        let mut cache = self.cache.write();
        cache.retain(|_, (_, at)| at.elapsed() < ttl);
        cache.insert(key, (prices, Instant::now()));
    }

    async fn fetch(&self, base_url: &str, ids: &[String], context: &ToolContext) -> Result<PriceTable, ToolError> {
        let url = format!("{}/simple/price", base_url.trim_end_matches('/'));
        let endpoint = endpoint_key(&url);
        let retry = HttpRetryManager::global();

        let mut request = self
            .client
            .get(&url)
            .query(&[("ids", ids.join(",")), ("vs_currencies", "usd".to_string())]);
        if let Some(key) = context.get_api_key(PRICE_API_KEY) {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| retry.transport_error("price_lookup", &endpoint, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(retry.status_error("price_lookup", &endpoint, status.as_u16(), &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| retry.transport_error("price_lookup", &endpoint, &e))?;
        retry.record_success(&endpoint);

        Ok(parse_prices(&body))
    }
}

impl Default for PriceLookupTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract `{id: {usd: price}}` pairs, skipping anything malformed
pub fn parse_prices(body: &Value) -> PriceTable {
    body.as_object()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(id, quote)| Some((id.clone(), quote.get("usd")?.as_f64()?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Render prices one per line, noting ids the provider did not quote
pub fn format_prices(ids: &[String], prices: &PriceTable) -> String {
    ids.iter()
        .map(|id| match prices.get(id) {
            Some(p) if *p >= 1.0 => format!("{}: ${:.2}", id, p),
            Some(p) => format!("{}: ${:.6}", id, p),
            None => format!("{}: price unavailable", id),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct PriceLookupParams {
    ids: Vec<String>,
}

#[async_trait]
impl Tool for PriceLookupTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params: PriceLookupParams = serde_json::from_value(params)
            .map_err(|e| ToolError::validation("price_lookup", e.to_string()))?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = params
            .ids
            .iter()
            .map(|id| id.trim().to_lowercase())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();
        if ids.is_empty() {
            return Err(ToolError::validation("price_lookup", "at least one price id is required"));
        }

        let base_url = context
            .setting(PRICE_API_URL_SETTING)
            .unwrap_or(DEFAULT_PRICE_API_URL)
            .to_string();
        let cache_key = format!("{}|{}", base_url, ids.join(","));

        let prices = match self.cached(&cache_key) {
            Some(prices) => {
                log::debug!("[price_lookup] Cache hit for {}", ids.join(","));
                prices
            }
            None => {
                let prices = self.fetch(&base_url, &ids, context).await?;
                self.store(cache_key, prices.clone());
                prices
            }
        };

        if prices.is_empty() {
            return Err(ToolError::execution(
                "price_lookup",
                format!("no prices returned for {}", ids.join(", ")),
            ));
        }

        Ok(ToolOutput::success(format_prices(&ids, &prices))
            .with_metadata(json!({ "prices": prices })))
    }
}
