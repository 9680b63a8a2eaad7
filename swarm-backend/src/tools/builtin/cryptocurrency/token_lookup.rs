//! Token Lookup tool for resolving token symbols to addresses
//!
//! Token data comes from config/tokens.ron, compiled into the binary.
//! Agents use this instead of guessing contract addresses.

use crate::tools::error::ToolError;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolOutput,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Address used for a network's native token
pub const NATIVE_TOKEN_ADDRESS: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

pub const DEFAULT_NETWORK: &str = "base";

type TokenTable = HashMap<String, HashMap<String, TokenInfo>>;

static TOKENS: OnceLock<Result<TokenTable, String>> = OnceLock::new();

/// Token info loaded from config
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub decimals: u8,
    pub name: String,
    #[serde(default)]
    pub price_id: Option<String>,
}

impl TokenInfo {
    pub fn is_native(&self) -> bool {
        self.address.eq_ignore_ascii_case(NATIVE_TOKEN_ADDRESS)
    }
}

/// Parsed token table. Parsing happens once; a broken table is reported as a
/// configuration error on every lookup rather than panicking.
pub fn tokens() -> Result<&'static TokenTable, ToolError> {
    TOKENS
        .get_or_init(|| {
            let table: TokenTable = ron::from_str(include_str!("../../../../config/tokens.ron"))
                .map_err(|e| format!("failed to parse tokens.ron: {}", e))?;
            let total: usize = table.values().map(|t| t.len()).sum();
            log::info!("[tokens] Loaded {} tokens across {} networks", total, table.len());
            Ok(table)
        })
        .as_ref()
        .map_err(|e| ToolError::Configuration(e.clone()))
}

/// Normalize user-facing network names ("ethereum" → "mainnet")
pub fn normalize_network(network: &str) -> String {
    match network.trim().to_lowercase().as_str() {
        "ethereum" | "eth" | "mainnet" | "l1" => "mainnet".to_string(),
        "" => DEFAULT_NETWORK.to_string(),
        other => other.to_string(),
    }
}

/// EVM chain id for a supported network
pub fn chain_id(network: &str) -> Option<u64> {
    match network {
        "base" => Some(8453),
        "mainnet" => Some(1),
        _ => None,
    }
}

/// Token Lookup tool
pub struct TokenLookupTool {
    definition: ToolDefinition,
}

impl TokenLookupTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "symbol".to_string(),
            PropertySchema::string("Token symbol (e.g., 'ETH', 'USDC'). Case-insensitive."),
        );
        properties.insert(
            "network".to_string(),
            PropertySchema::string("Network: 'base' or 'mainnet'")
                .with_default(json!(DEFAULT_NETWORK)),
        );

        TokenLookupTool {
            definition: ToolDefinition {
                name: "token_lookup".to_string(),
                description: "Look up a token's contract address, decimals and price id by symbol.".to_string(),
                input_schema: ToolInputSchema::new(properties, &["symbol"]).into(),
            },
        }
    }

    fn lookup(symbol: &str, network: &str) -> Result<Option<TokenInfo>, ToolError> {
        let symbol_upper = symbol.trim().trim_start_matches('$').to_uppercase();
        Ok(tokens()?
            .get(network)
            .and_then(|network_tokens| network_tokens.get(&symbol_upper))
            .cloned())
    }

    fn list_available(network: &str) -> Result<Vec<String>, ToolError> {
        Ok(tokens()?
            .get(network)
            .map(|network_tokens| {
                let mut symbols: Vec<String> = network_tokens.keys().cloned().collect();
                symbols.sort();
                symbols
            })
            .unwrap_or_default())
    }
}

impl Default for TokenLookupTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct TokenLookupParams {
    symbol: String,
    #[serde(default)]
    network: Option<String>,
}

#[async_trait]
impl Tool for TokenLookupTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params: TokenLookupParams = serde_json::from_value(params)
            .map_err(|e| ToolError::validation("token_lookup", e.to_string()))?;
        let network = normalize_network(params.network.as_deref().unwrap_or(DEFAULT_NETWORK));
        let symbol = params.symbol.trim().trim_start_matches('$').to_uppercase();

        match Self::lookup(&symbol, &network)? {
            Some(token) => {
                log::debug!("[token_lookup] {} on {} -> {}", symbol, network, token.address);
                Ok(ToolOutput::success(format!(
                    "{} ({}) on {}\nAddress: {}\nDecimals: {}",
                    token.name, symbol, network, token.address, token.decimals
                ))
                .with_metadata(json!({
                    "symbol": symbol,
                    "address": token.address,
                    "decimals": token.decimals,
                    "name": token.name,
                    "network": network,
                    "price_id": token.price_id,
                    "native": token.is_native(),
                })))
            }
            None => {
                let available = Self::list_available(&network)?;
                Err(ToolError::execution(
                    "token_lookup",
                    format!(
                        "token '{}' not found on {}. Available tokens: {}",
                        symbol,
                        network,
                        available.join(", ")
                    ),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_token_lookup() {
        let token = TokenLookupTool::lookup("USDC", "base").unwrap().unwrap();
        assert_eq!(token.address, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
        assert_eq!(token.decimals, 6);
        assert_eq!(token.price_id.as_deref(), Some("usd-coin"));
    }

    #[test]
    fn test_case_insensitive_and_dollar_prefix() {
        let a = TokenLookupTool::lookup("usdc", "base").unwrap().unwrap();
        let b = TokenLookupTool::lookup("$Usdc", "base").unwrap().unwrap();
        assert_eq!(a.address, b.address);
    }

    #[test]
    fn test_native_token() {
        let token = TokenLookupTool::lookup("ETH", "mainnet").unwrap().unwrap();
        assert!(token.is_native());
    }

    #[test]
    fn test_network_normalization() {
        assert_eq!(normalize_network("Ethereum"), "mainnet");
        assert_eq!(normalize_network(""), "base");
        assert_eq!(chain_id("base"), Some(8453));
        assert_eq!(chain_id("solana"), None);
    }

    #[tokio::test]
    async fn test_unknown_token_is_an_execution_error() {
        let tool = TokenLookupTool::new();
        let err = tool
            .execute(json!({"symbol": "NOPE"}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
        assert!(err.to_string().contains("USDC"));
    }

    #[tokio::test]
    async fn test_lookup_metadata() {
        let tool = TokenLookupTool::new();
        let out = tool
            .execute(json!({"symbol": "wbtc", "network": "ethereum"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out.meta_str("network"), Some("mainnet"));
        assert_eq!(out.meta_u64("decimals"), Some(8));
        assert_eq!(out.meta_str("price_id"), Some("wrapped-bitcoin"));
    }
}
