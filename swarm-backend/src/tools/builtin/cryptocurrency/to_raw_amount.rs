//! Converts a human decimal amount ("1.5") into base units ("1500000") for a
//! token with the given number of decimals.

use crate::tools::error::ToolError;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolOutput,
};
use async_trait::async_trait;
use ethers::types::U256;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

pub struct ToRawAmountTool {
    definition: ToolDefinition,
}

impl ToRawAmountTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "amount".to_string(),
            PropertySchema::string("Human-readable amount, e.g. '1.5'"),
        );
        properties.insert(
            "decimals".to_string(),
            PropertySchema::new("integer", "Token decimals (e.g. 18 for ETH, 6 for USDC)")
                .with_range(0, 77),
        );

        ToRawAmountTool {
            definition: ToolDefinition {
                name: "to_raw_amount".to_string(),
                description: "Convert a decimal token amount into its integer base-unit representation.".to_string(),
                input_schema: ToolInputSchema::new(properties, &["amount", "decimals"]).into(),
            },
        }
    }
}

impl Default for ToRawAmountTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact decimal-string to base-unit conversion. No floating point involved.
pub fn to_raw_amount(amount: &str, decimals: u8) -> Result<U256, String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err("amount is empty".to_string());
    }

    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(format!("'{}' is not a number", amount));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("'{}' is not a non-negative decimal number", amount));
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(format!(
            "'{}' has more than {} decimal places",
            amount, decimals
        ));
    }

    let digits = format!(
        "{}{}{}",
        if whole.is_empty() { "0" } else { whole },
        frac,
        "0".repeat(decimals as usize - frac.len())
    );
    U256::from_dec_str(&digits).map_err(|e| format!("'{}' is out of range: {}", amount, e))
}

#[derive(Debug, Deserialize)]
struct ToRawAmountParams {
    amount: String,
    decimals: u8,
}

#[async_trait]
impl Tool for ToRawAmountTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params: ToRawAmountParams = serde_json::from_value(params)
            .map_err(|e| ToolError::validation("to_raw_amount", e.to_string()))?;

        let raw = to_raw_amount(&params.amount, params.decimals)
            .map_err(|reason| ToolError::execution("to_raw_amount", reason))?;

        Ok(ToolOutput::success(raw.to_string()).with_metadata(json!({
            "amount": params.amount,
            "decimals": params.decimals,
            "raw_amount": raw.to_string(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion() {
        assert_eq!(to_raw_amount("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(to_raw_amount("1", 18).unwrap().to_string(), "1000000000000000000");
        assert_eq!(to_raw_amount(".25", 2).unwrap(), U256::from(25u64));
        assert_eq!(to_raw_amount("0.100", 1).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(to_raw_amount("", 6).is_err());
        assert!(to_raw_amount("-1", 6).is_err());
        assert!(to_raw_amount("1e5", 6).is_err());
        assert!(to_raw_amount("0.1234567", 6).is_err());
        assert!(to_raw_amount(".", 6).is_err());
    }

    #[tokio::test]
    async fn test_tool_output() {
        let out = ToRawAmountTool::new()
            .execute(json!({"amount": "2", "decimals": 8}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out.content, "200000000");
    }

    #[tokio::test]
    async fn test_decimals_out_of_range_rejected_by_registry() {
        use crate::tools::registry::ToolRegistry;
        use crate::tools::types::ToolCategory;
        use std::sync::Arc;

        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(ToRawAmountTool::new()), ToolCategory::Blockchain)
            .unwrap();
        let err = registry
            .find("to_raw_amount")
            .unwrap()
            .invoke(json!({"amount": "2", "decimals": 200}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }
}
