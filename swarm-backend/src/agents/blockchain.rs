//! Blockchain agent: prepares transfers and swap intents. Never signs or
//! broadcasts anything.

use super::{Agent, AgentContext, AgentDescriptor, AgentError, CatalogError, LocalToolset};
use crate::multi_agent::types::SubtaskPayload;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::ToolOutput;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;

const TRANSFER_PATTERN: &str =
    r"(?i)\b(?:send|transfer)\s+(\d+(?:\.\d+)?|\.\d+)\s+\$?([A-Za-z]{2,10})\s+to\s+(0x[0-9a-fA-F]{40})\b";
const SWAP_PATTERN: &str =
    r"(?i)\b(?:swap|exchange|trade)\s+(\d+(?:\.\d+)?|\.\d+)\s+\$?([A-Za-z]{2,10})\s+(?:for|to|into)\s+\$?([A-Za-z]{2,10})\b";
const NETWORK_PATTERN: &str = r"(?i)\bon\s+(base|mainnet|ethereum)\b";

const USAGE: &str =
    "expected 'send <amount> <token> to <0x address>' or 'swap <amount> <token> for <token>'";

struct Patterns {
    transfer: Regex,
    swap: Regex,
    network: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Patterns {
            transfer: Regex::new(TRANSFER_PATTERN)?,
            swap: Regex::new(SWAP_PATTERN)?,
            network: Regex::new(NETWORK_PATTERN)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Intent {
    Transfer {
        amount: String,
        symbol: String,
        to: String,
        network: String,
    },
    Swap {
        amount: String,
        sell: String,
        buy: String,
        network: String,
    },
}

pub struct BlockchainAgent {
    descriptor: Arc<AgentDescriptor>,
    tools: LocalToolset,
    patterns: Patterns,
}

impl BlockchainAgent {
    pub fn build(descriptor: Arc<AgentDescriptor>, registry: &ToolRegistry) -> Result<Arc<dyn Agent>, CatalogError> {
        let tools = LocalToolset::resolve(registry, &descriptor).map_err(|source| CatalogError::Tool {
            agent: descriptor.name.clone(),
            source,
        })?;
        let patterns = Patterns::compile().map_err(|e| CatalogError::Invalid {
            agent: descriptor.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(BlockchainAgent {
            descriptor,
            tools,
            patterns,
        }))
    }

    fn parse(&self, text: &str) -> Option<Intent> {
        let network = self
            .patterns
            .network
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| "base".to_string());

        if let Some(c) = self.patterns.transfer.captures(text) {
            return Some(Intent::Transfer {
                amount: c[1].to_string(),
                symbol: c[2].to_uppercase(),
                to: c[3].to_string(),
                network,
            });
        }
        self.patterns.swap.captures(text).map(|c| Intent::Swap {
            amount: c[1].to_string(),
            sell: c[2].to_uppercase(),
            buy: c[3].to_uppercase(),
            network,
        })
    }

    async fn lookup(&self, symbol: &str, network: &str, context: &AgentContext) -> Result<ToolOutput, AgentError> {
        self.tools
            .call("token_lookup", json!({"symbol": symbol, "network": network}), &context.tools)
            .await
    }

    async fn raw_amount(&self, amount: &str, token: &ToolOutput, context: &AgentContext) -> Result<String, AgentError> {
        let decimals = token.meta_u64("decimals").unwrap_or(18);
        let out = self
            .tools
            .call("to_raw_amount", json!({"amount": amount, "decimals": decimals}), &context.tools)
            .await?;
        Ok(out.content)
    }

    async fn prepare_transfer(
        &self,
        amount: &str,
        symbol: &str,
        to: &str,
        network: &str,
        context: &AgentContext,
    ) -> Result<Value, AgentError> {
        let token = self.lookup(symbol, network, context).await?;
        let raw = self.raw_amount(amount, &token, context).await?;
        let address = token.meta_str("address").unwrap_or_default().to_string();
        let network = token.meta_str("network").unwrap_or(network).to_string();

        let built = self
            .tools
            .call(
                "build_transfer",
                json!({"token_address": address, "to": to, "raw_amount": raw, "network": network}),
                &context.tools,
            )
            .await?;
        let tx = built
            .metadata
            .as_ref()
            .and_then(|m| m.get("tx"))
            .cloned()
            .unwrap_or(Value::Null);

        Ok(json!({
            "summary": format!(
                "Prepared a transfer of {} {} to {} on {}. Review and sign it in your wallet to submit.",
                amount, symbol, to, network
            ),
            "tx": tx,
        }))
    }

    async fn prepare_swap(
        &self,
        amount: &str,
        sell: &str,
        buy: &str,
        network: &str,
        context: &AgentContext,
    ) -> Result<Value, AgentError> {
        if sell == buy {
            return Err(AgentError::InvalidInstructions(format!("cannot swap {} for itself", sell)));
        }
        let sell_token = self.lookup(sell, network, context).await?;
        let buy_token = self.lookup(buy, network, context).await?;
        let raw = self.raw_amount(amount, &sell_token, context).await?;
        let network = sell_token.meta_str("network").unwrap_or(network).to_string();

        Ok(json!({
            "summary": format!(
                "Prepared a swap of {} {} for {} on {}. Nothing has been submitted.",
                amount, sell, buy, network
            ),
            "swap_intent": {
                "network": network,
                "sell_token": sell_token.meta_str("address"),
                "buy_token": buy_token.meta_str("address"),
                "sell_amount_raw": raw,
            },
        }))
    }
}

#[async_trait]
impl Agent for BlockchainAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn run(&self, instructions: &str, context: &AgentContext) -> Result<SubtaskPayload, AgentError> {
        let intent = self
            .parse(instructions)
            .ok_or_else(|| AgentError::InvalidInstructions(USAGE.to_string()))?;
        log::debug!("[AGENT] blockchain parsed {:?}", intent);

        let payload = match intent {
            Intent::Transfer {
                amount,
                symbol,
                to,
                network,
            } => self.prepare_transfer(&amount, &symbol, &to, &network, context).await?,
            Intent::Swap {
                amount,
                sell,
                buy,
                network,
            } => self.prepare_swap(&amount, &sell, &buy, &network, context).await?,
        };
        Ok(SubtaskPayload::Structured(payload))
    }
}
