//! Market data agent: finds token symbols in the request and quotes them.

use super::{Agent, AgentContext, AgentDescriptor, AgentError, CatalogError, LocalToolset};
use crate::multi_agent::types::SubtaskPayload;
use crate::tools::error::ToolError;
use crate::tools::registry::ToolRegistry;
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;

/// Plain-word names people use instead of ticker symbols
const ALIASES: &[(&str, &str)] = &[
    ("bitcoin", "WBTC"),
    ("btc", "WBTC"),
    ("ethereum", "ETH"),
    ("ether", "ETH"),
    ("eth", "ETH"),
    ("usdc", "USDC"),
    ("dai", "DAI"),
];

/// `$eth`, or an all-caps ticker like `USDC`
const SYMBOL_PATTERN: &str = r"\$([A-Za-z][A-Za-z0-9]{1,9})\b|\b([A-Z][A-Z0-9]{1,9})\b";

/// Networks searched for a symbol, in order
const NETWORKS: &[&str] = &["mainnet", "base"];

pub struct CryptoDataAgent {
    descriptor: Arc<AgentDescriptor>,
    tools: LocalToolset,
    symbol_pattern: Regex,
}

impl CryptoDataAgent {
    pub fn build(descriptor: Arc<AgentDescriptor>, registry: &ToolRegistry) -> Result<Arc<dyn Agent>, CatalogError> {
        let tools = LocalToolset::resolve(registry, &descriptor).map_err(|source| CatalogError::Tool {
            agent: descriptor.name.clone(),
            source,
        })?;
        let symbol_pattern = Regex::new(SYMBOL_PATTERN).map_err(|e| {
            CatalogError::Invalid {
                agent: descriptor.name.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Arc::new(CryptoDataAgent {
            descriptor,
            tools,
            symbol_pattern,
        }))
    }

    /// Candidate symbols in order of appearance, deduplicated
    fn candidates(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = self
            .symbol_pattern
            .captures_iter(text)
            .filter_map(|c| {
                let m = c.get(1).or_else(|| c.get(2))?;
                Some((m.start(), m.as_str().to_uppercase()))
            })
            .collect();

        for (offset, word) in word_offsets(text) {
            let lower = word.to_lowercase();
            if let Some((_, symbol)) = ALIASES.iter().find(|(alias, _)| *alias == lower) {
                found.push((offset, symbol.to_string()));
            }
        }

        found.sort_by_key(|(offset, _)| *offset);
        let mut symbols: Vec<String> = Vec::new();
        for (_, symbol) in found {
            let symbol = ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(&symbol))
                .map(|(_, s)| s.to_string())
                .unwrap_or(symbol);
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        symbols
    }

    /// Price id for a symbol, or `None` if no network knows it
    async fn price_id(&self, symbol: &str, context: &AgentContext) -> Result<Option<String>, AgentError> {
        for network in NETWORKS {
            match self
                .tools
                .call("token_lookup", json!({"symbol": symbol, "network": network}), &context.tools)
                .await
            {
                Ok(out) => return Ok(out.meta_str("price_id").map(|s| s.to_string())),
                Err(AgentError::Tool(ToolError::Execution { .. })) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

fn word_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_ascii_alphanumeric(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                words.push((s, &text[s..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push((s, &text[s..]));
    }
    words
}

#[async_trait]
impl Agent for CryptoDataAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn run(&self, instructions: &str, context: &AgentContext) -> Result<SubtaskPayload, AgentError> {
        let mut quoted: Vec<(String, String)> = Vec::new();
        for symbol in self.candidates(instructions) {
            if let Some(id) = self.price_id(&symbol, context).await? {
                if !quoted.iter().any(|(_, existing)| existing == &id) {
                    quoted.push((symbol, id));
                }
            }
        }
        if quoted.is_empty() {
            return Err(AgentError::InvalidInstructions(
                "no known token symbols in the request".to_string(),
            ));
        }

        let ids: Vec<&str> = quoted.iter().map(|(_, id)| id.as_str()).collect();
        log::debug!("[AGENT] crypto_data quoting {:?}", ids);
        let out = self
            .tools
            .call("price_lookup", json!({ "ids": ids }), &context.tools)
            .await?;

        // Show tickers rather than provider ids
        let mut text = out.content.clone();
        for (symbol, id) in &quoted {
            text = text.replace(&format!("{}:", id), &format!("{}:", symbol));
        }
        Ok(SubtaskPayload::Text(text))
    }
}
