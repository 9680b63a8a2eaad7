//! Builds an unsigned transfer transaction request.
//!
//! Nothing is signed or broadcast here; the output is a tx request that a
//! wallet (or the user) can review and submit.

use super::token_lookup::{chain_id, normalize_network, DEFAULT_NETWORK, NATIVE_TOKEN_ADDRESS};
use crate::tools::error::ToolError;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolOutput,
};
use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::types::{Address, U256};
use ethers::utils::id;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;

pub struct BuildTransferTool {
    definition: ToolDefinition,
}

impl BuildTransferTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "token_address".to_string(),
            PropertySchema::string("Token contract address (0xEeee... for the native token)"),
        );
        properties.insert(
            "to".to_string(),
            PropertySchema::string("Recipient address"),
        );
        properties.insert(
            "raw_amount".to_string(),
            PropertySchema::string("Amount in base units, as returned by to_raw_amount"),
        );
        properties.insert(
            "network".to_string(),
            PropertySchema::string("Network: 'base' or 'mainnet'")
                .with_default(json!(DEFAULT_NETWORK)),
        );

        BuildTransferTool {
            definition: ToolDefinition {
                name: "build_transfer".to_string(),
                description: "Build an unsigned native or ERC-20 transfer transaction.".to_string(),
                input_schema: ToolInputSchema::new(properties, &["token_address", "to", "raw_amount"]).into(),
            },
        }
    }
}

impl Default for BuildTransferTool {
    fn default() -> Self {
        Self::new()
    }
}

/// ABI-encode `transfer(address,uint256)` calldata
pub fn erc20_transfer_calldata(to: Address, amount: U256) -> Vec<u8> {
    let mut data = id("transfer(address,uint256)").to_vec();
    data.extend(encode(&[Token::Address(to), Token::Uint(amount)]));
    data
}

#[derive(Debug, Deserialize)]
struct BuildTransferParams {
    token_address: String,
    to: String,
    raw_amount: String,
    #[serde(default)]
    network: Option<String>,
}

fn parse_address(field: &str, value: &str) -> Result<Address, ToolError> {
    Address::from_str(value.trim()).map_err(|e| {
        ToolError::validation("build_transfer", format!("invalid {} '{}': {}", field, value, e))
    })
}

#[async_trait]
impl Tool for BuildTransferTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params: BuildTransferParams = serde_json::from_value(params)
            .map_err(|e| ToolError::validation("build_transfer", e.to_string()))?;

        let network = normalize_network(params.network.as_deref().unwrap_or(DEFAULT_NETWORK));
        let chain = chain_id(&network).ok_or_else(|| {
            ToolError::execution("build_transfer", format!("unsupported network '{}'", network))
        })?;
        let recipient = parse_address("recipient", &params.to)?;
        let amount = U256::from_dec_str(params.raw_amount.trim()).map_err(|e| {
            ToolError::validation(
                "build_transfer",
                format!("invalid raw_amount '{}': {}", params.raw_amount, e),
            )
        })?;
        if amount.is_zero() {
            return Err(ToolError::execution("build_transfer", "amount must be greater than zero"));
        }

        let tx = if params.token_address.trim().eq_ignore_ascii_case(NATIVE_TOKEN_ADDRESS) {
            json!({
                "chain_id": chain,
                "to": format!("{:?}", recipient),
                "value": amount.to_string(),
                "data": "0x",
            })
        } else {
            let token = parse_address("token_address", &params.token_address)?;
            json!({
                "chain_id": chain,
                "to": format!("{:?}", token),
                "value": "0",
                "data": format!("0x{}", hex::encode(erc20_transfer_calldata(recipient, amount))),
            })
        };

        log::debug!("[build_transfer] {} on {} -> {:?}", amount, network, recipient);

        Ok(ToolOutput::success(serde_json::to_string_pretty(&tx).unwrap_or_default())
            .with_metadata(json!({ "network": network, "tx": tx })))
    }
}
