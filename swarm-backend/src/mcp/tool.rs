//! A discovered remote tool, proxied through an `McpTransport`.

use super::client::McpTransport;
use super::types::McpToolDescriptor;
use crate::tools::error::ToolError;
use crate::tools::registry::{compile_schema, Tool};
use crate::tools::types::{ToolContext, ToolDefinition, ToolOutput};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct McpTool {
    remote_name: String,
    server_url: String,
    definition: ToolDefinition,
    transport: Arc<dyn McpTransport>,
}

impl McpTool {
    /// Wrap a discovered tool. Registered as `<agent>.<tool>` so two servers
    /// exposing the same tool name do not collide.
    pub fn from_descriptor(
        agent_name: &str,
        server_url: &str,
        descriptor: &McpToolDescriptor,
        transport: Arc<dyn McpTransport>,
    ) -> Result<Self, ToolError> {
        // Servers may omit inputSchema for argument-less tools.
        let input_schema = if descriptor.input_schema.is_null() {
            json!({ "type": "object" })
        } else {
            descriptor.input_schema.clone()
        };
        compile_schema(&input_schema).map_err(|reason| {
            ToolError::Configuration(format!(
                "tool '{}' from {} has an invalid schema: {}",
                descriptor.name, server_url, reason
            ))
        })?;

        Ok(McpTool {
            remote_name: descriptor.name.clone(),
            server_url: server_url.to_string(),
            definition: ToolDefinition {
                name: qualified_tool_name(agent_name, &descriptor.name),
                description: descriptor
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Remote tool '{}'", descriptor.name)),
                input_schema,
            },
            transport,
        })
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

pub fn qualified_tool_name(agent_name: &str, tool_name: &str) -> String {
    format!("{}.{}", agent_name, tool_name)
}

#[async_trait]
impl Tool for McpTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let arguments = if params.is_null() { json!({}) } else { params };
        let result = self
            .transport
            .call_tool(&self.server_url, &self.remote_name, arguments)
            .await?;

        let text = result.text();
        if result.is_error {
            let reason = if text.is_empty() {
                "remote tool reported an error".to_string()
            } else {
                text
            };
            return Err(ToolError::execution(&self.definition.name, reason));
        }

        Ok(ToolOutput::success(text).with_metadata(json!({
            "server": self.server_url,
            "tool": self.remote_name,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::tests::{descriptor, FakeTransport};

    fn search_descriptor() -> McpToolDescriptor {
        descriptor(
            "search",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string", "description": "Search text"}},
                "required": ["query"]
            }),
        )
    }

    #[tokio::test]
    async fn test_proxies_call() {
        let transport = Arc::new(FakeTransport::with_tools(vec![]));
        let tool = McpTool::from_descriptor("docs", "http://mcp.local", &search_descriptor(), transport.clone())
            .unwrap();
        assert_eq!(tool.name(), "docs.search");
        assert_eq!(tool.remote_name(), "search");

        let out = tool
            .execute(json!({"query": "rust"}), &ToolContext::new())
            .await
            .unwrap();
        assert!(out.content.starts_with("search -> "));
        assert_eq!(transport.calls.lock()[0].0, "search");
    }

    #[tokio::test]
    async fn test_remote_error_is_execution_error() {
        let transport = Arc::new(FakeTransport::with_tools(vec![]).failing_calls());
        let tool = McpTool::from_descriptor("docs", "http://mcp.local", &search_descriptor(), transport)
            .unwrap();
        let err = tool
            .execute(json!({"query": "rust"}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { ref tool, .. } if tool == "docs.search"));
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let transport = Arc::new(FakeTransport::with_tools(vec![]));
        let bad = descriptor("broken", json!({"type": "array"}));
        let err = McpTool::from_descriptor("docs", "http://mcp.local", &bad, transport.clone()).err();
        assert!(matches!(err, Some(ToolError::Configuration(_))));

        let bad_keyword = descriptor("broken", json!({"type": "object", "properties": {"n": {"minimum": "one"}}}));
        let err = McpTool::from_descriptor("docs", "http://mcp.local", &bad_keyword, transport).err();
        assert!(matches!(err, Some(ToolError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_remote_constraints_checked_before_call() {
        use crate::tools::registry::ToolRegistry;
        use crate::tools::types::ToolCategory;

        let weather = descriptor(
            "weather",
            json!({
                "type": "object",
                "properties": {
                    "units": {"enum": ["metric", "imperial"]},
                    "days": {"type": "integer", "minimum": 1, "maximum": 7},
                    "loc": {
                        "type": "object",
                        "properties": {"lat": {"type": "number"}},
                        "required": ["lat"]
                    }
                }
            }),
        );
        let transport = Arc::new(FakeTransport::with_tools(vec![]));
        let tool = McpTool::from_descriptor("wx", "http://mcp.local", &weather, transport.clone()).unwrap();
        let registry = ToolRegistry::new();
        registry.register(Arc::new(tool), ToolCategory::External).unwrap();
        let handle = registry.find("wx.weather").unwrap();

        let err = handle
            .invoke(json!({"units": "kelvin", "days": 99, "loc": {}}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
        assert!(transport.calls.lock().is_empty());

        handle
            .invoke(json!({"units": "metric", "days": 2, "loc": {"lat": 1.5}}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(transport.calls.lock().len(), 1);
    }
}
