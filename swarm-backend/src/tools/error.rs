//! Tool-layer error taxonomy.
//!
//! Every failure a tool (or the registry around it) can produce maps onto one
//! of these variants. Agents never let them escape `Agent::handle`; they are
//! folded into a failed `SubtaskOutput` instead.

use super::types::ToolCategory;
use thiserror::Error;

/// Errors raised by the tool registry and by tool execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// No tool is registered under the requested name (and category, if given).
    #[error("tool '{name}' not found{}", in_category(.category))]
    NotFound {
        category: Option<ToolCategory>,
        name: String,
    },

    /// A tool definition is unusable, a registration conflicts, or a remote
    /// capability provider could not be reached during discovery.
    #[error("tool configuration error: {0}")]
    Configuration(String),

    /// Parameters did not match the tool's declared input schema.
    #[error("invalid parameters for '{tool}': {reason}")]
    Validation { tool: String, reason: String },

    /// The tool ran and failed.
    #[error("'{tool}' failed: {reason}")]
    Execution { tool: String, reason: String },

    /// The upstream provider rejected our credentials.
    #[error("'{tool}' was rejected by the provider: {reason}")]
    Authentication { tool: String, reason: String },

    /// The upstream provider is throttling us.
    #[error("'{tool}' is rate limited{}", retry_hint(.retry_after_secs))]
    RateLimit {
        tool: String,
        retry_after_secs: Option<u64>,
    },
}

impl ToolError {
    pub fn not_found(category: Option<ToolCategory>, name: impl Into<String>) -> Self {
        ToolError::NotFound {
            category,
            name: name.into(),
        }
    }

    pub fn validation(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::Validation {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::Execution {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable label, used in logs and response metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound { .. } => "tool_not_found",
            ToolError::Configuration(_) => "tool_configuration",
            ToolError::Validation { .. } => "tool_validation",
            ToolError::Execution { .. } => "tool_execution",
            ToolError::Authentication { .. } => "tool_authentication",
            ToolError::RateLimit { .. } => "tool_rate_limit",
        }
    }
}

fn in_category(category: &Option<ToolCategory>) -> String {
    category
        .map(|c| format!(" in category '{}'", c))
        .unwrap_or_default()
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(", retry after {}s", secs))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_mentions_category() {
        let err = ToolError::not_found(Some(ToolCategory::Data), "price_lookup");
        assert_eq!(
            err.to_string(),
            "tool 'price_lookup' not found in category 'data'"
        );

        let bare = ToolError::not_found(None, "mystery");
        assert_eq!(bare.to_string(), "tool 'mystery' not found");
    }

    #[test]
    fn test_rate_limit_message() {
        let err = ToolError::RateLimit {
            tool: "price_lookup".to_string(),
            retry_after_secs: Some(10),
        };
        assert_eq!(err.to_string(), "'price_lookup' is rate limited, retry after 10s");
        assert_eq!(err.kind(), "tool_rate_limit");
    }
}
