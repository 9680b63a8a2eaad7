//! Agent backed by a remote MCP server. Its tools are discovered on first
//! use, registered under `External`, and memoized for the process lifetime.

use super::{Agent, AgentContext, AgentDescriptor, AgentError, AgentHealth};
use crate::mcp::client::{discover_tools, McpTransport};
use crate::mcp::tool::{qualified_tool_name, McpTool};
use crate::multi_agent::types::SubtaskPayload;
use crate::tools::registry::{Tool, ToolHandle, ToolRegistry};
use crate::tools::types::ToolCategory;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug)]
enum Capabilities {
    Ready(Vec<ToolHandle>),
    Degraded(String),
}

pub struct McpAgent {
    descriptor: Arc<AgentDescriptor>,
    registry: Arc<ToolRegistry>,
    transport: Arc<dyn McpTransport>,
    capabilities: OnceCell<Capabilities>,
}

impl McpAgent {
    pub fn new(
        descriptor: Arc<AgentDescriptor>,
        registry: Arc<ToolRegistry>,
        transport: Arc<dyn McpTransport>,
    ) -> Self {
        McpAgent {
            descriptor,
            registry,
            transport,
            capabilities: OnceCell::new(),
        }
    }

    /// Discovered tools; concurrent first callers share one discovery
    async fn capabilities(&self) -> &Capabilities {
        self.capabilities.get_or_init(|| self.discover()).await
    }

    async fn discover(&self) -> Capabilities {
        let name = &self.descriptor.name;
        let Some(server_url) = self.descriptor.mcp_server_url.as_deref() else {
            return Capabilities::Degraded("no MCP server configured".to_string());
        };

        let listed = match discover_tools(self.transport.as_ref(), server_url).await {
            Ok(listed) => listed,
            Err(e) => {
                log::warn!("[MCP] Discovery for '{}' failed, agent degraded: {}", name, e);
                return Capabilities::Degraded(e.to_string());
            }
        };

        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(listed.len());
        for descriptor in &listed {
            match McpTool::from_descriptor(name, server_url, descriptor, self.transport.clone()) {
                Ok(tool) => tools.push(Arc::new(tool)),
                Err(e) => log::warn!("[MCP] Skipping tool from '{}': {}", name, e),
            }
        }
        let names: Vec<String> = tools.iter().map(|t| t.name()).collect();

        if let Err(e) = self.registry.register_many(ToolCategory::External, tools) {
            log::warn!("[MCP] Registering tools for '{}' failed, agent degraded: {}", name, e);
            return Capabilities::Degraded(e.to_string());
        }

        match names
            .iter()
            .map(|n| self.registry.get(ToolCategory::External, n))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(handles) => {
                log::info!("[MCP] Agent '{}' ready with {} tools", name, handles.len());
                Capabilities::Ready(handles)
            }
            Err(e) => Capabilities::Degraded(e.to_string()),
        }
    }

    fn remote_name<'a>(&self, handle: &'a ToolHandle) -> &'a str {
        let prefix = qualified_tool_name(&self.descriptor.name, "");
        handle.name().strip_prefix(prefix.as_str()).unwrap_or(handle.name())
    }

    /// A tool named in the instructions (longest name wins), else the only tool
    fn choose<'a>(&self, tools: &'a [ToolHandle], instructions: &str) -> Result<&'a ToolHandle, AgentError> {
        let lower = instructions.to_lowercase();
        let mentioned = tools
            .iter()
            .filter(|t| {
                let remote = self.remote_name(t).to_lowercase();
                lower
                    .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-' || c == '.'))
                    .any(|word| word == remote || word == t.name().to_lowercase())
            })
            .max_by_key(|t| t.name().len());

        match (mentioned, tools) {
            (Some(tool), _) => Ok(tool),
            (None, [only]) => Ok(only),
            (None, []) => Err(AgentError::NoMatchingTool(format!(
                "'{}' exposes no tools",
                self.descriptor.name
            ))),
            (None, _) => Err(AgentError::NoMatchingTool(format!(
                "name one of: {}",
                tools.iter().map(|t| self.remote_name(t)).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

/// Arguments for a call: an embedded JSON object wins; otherwise a lone
/// string parameter receives the whole instruction text.
fn build_arguments(tool: &ToolHandle, instructions: &str) -> Value {
    if let (Some(start), Some(end)) = (instructions.find('{'), instructions.rfind('}')) {
        if start < end {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&instructions[start..=end]) {
                return value;
            }
        }
    }

    let schema = &tool.definition().input_schema;
    let properties = schema.get("properties").and_then(Value::as_object);
    let string_params: Vec<&String> = properties
        .map(|props| {
            props
                .iter()
                .filter(|(_, p)| matches!(p.get("type").and_then(Value::as_str), Some("string") | None))
                .map(|(name, _)| name)
                .collect()
        })
        .unwrap_or_default();
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let property_count = properties.map(|props| props.len()).unwrap_or(0);
    let target = match required.as_slice() {
        [only] => string_params.iter().copied().find(|name| name.as_str() == *only),
        [] if string_params.len() == 1 && property_count == 1 => Some(string_params[0]),
        _ => None,
    };

    let mut arguments = serde_json::Map::new();
    if let Some(name) = target {
        arguments.insert(name.clone(), Value::String(instructions.trim().to_string()));
    }
    Value::Object(arguments)
}

#[async_trait]
impl Agent for McpAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn health(&self) -> AgentHealth {
        match self.capabilities.get() {
            None => AgentHealth::Pending,
            Some(Capabilities::Ready(_)) => AgentHealth::Ready,
            Some(Capabilities::Degraded(reason)) => AgentHealth::Degraded(reason.clone()),
        }
    }

    async fn prepare(&self) {
        self.capabilities().await;
    }

    async fn run(&self, instructions: &str, context: &AgentContext) -> Result<SubtaskPayload, AgentError> {
        let tools = match self.capabilities().await {
            Capabilities::Ready(tools) => tools,
            Capabilities::Degraded(reason) => return Err(AgentError::Degraded(reason.clone())),
        };
        let tool = self.choose(tools, instructions)?;
        let arguments = build_arguments(tool, instructions);
        let out = tool.invoke(arguments, &context.tools).await?;
        Ok(SubtaskPayload::Text(out.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::tests::{descriptor, FakeTransport};
    use serde_json::json;
    use uuid::Uuid;

    fn agent_descriptor() -> Arc<AgentDescriptor> {
        Arc::new(
            ron::from_str(
                r#"(name: "docs", human_readable_name: "Docs", command: "docs", description: "",
                    delegator_description: "documentation", mcp_server_url: Some("http://mcp.local/rpc"))"#,
            )
            .unwrap(),
        )
    }

    fn search_and_fetch() -> FakeTransport {
        FakeTransport::with_tools(vec![
            descriptor(
                "search",
                json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}),
            ),
            descriptor(
                "fetch",
                json!({"type": "object", "properties": {"url": {"type": "string"}, "raw": {"type": "boolean"}}, "required": ["url"]}),
            ),
        ])
    }

    #[tokio::test]
    async fn test_discovery_runs_once_under_concurrency() {
        let transport = Arc::new(search_and_fetch());
        let registry = Arc::new(ToolRegistry::new());
        let agent = McpAgent::new(agent_descriptor(), registry.clone(), transport.clone());
        assert_eq!(agent.health(), AgentHealth::Pending);

        futures_util::future::join_all((0..5).map(|_| agent.prepare())).await;

        assert_eq!(*transport.initialize_count.lock(), 1);
        assert_eq!(*transport.list_count.lock(), 1);
        assert_eq!(agent.health(), AgentHealth::Ready);
        assert!(registry.has_tool(ToolCategory::External, "docs.search"));
        assert!(registry.has_tool(ToolCategory::External, "docs.fetch"));
    }

    #[tokio::test]
    async fn test_tools_on_later_pages_are_registered() {
        let registry = Arc::new(ToolRegistry::new());
        let agent = McpAgent::new(agent_descriptor(), registry.clone(), Arc::new(search_and_fetch().paged(1)));
        agent.prepare().await;
        assert_eq!(agent.health(), AgentHealth::Ready);
        assert!(registry.has_tool(ToolCategory::External, "docs.search"));
        assert!(registry.has_tool(ToolCategory::External, "docs.fetch"));
    }

    #[tokio::test]
    async fn test_discovery_failure_degrades() {
        let registry = Arc::new(ToolRegistry::new());
        let agent = McpAgent::new(agent_descriptor(), registry.clone(), Arc::new(FakeTransport::unreachable()));
        agent.prepare().await;
        assert!(matches!(agent.health(), AgentHealth::Degraded(_)));
        assert!(registry.is_empty());

        let out = agent.handle("search rust", &AgentContext::new(Uuid::new_v4())).await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_registry_conflict_degrades() {
        let registry = Arc::new(ToolRegistry::new());
        let first = McpAgent::new(agent_descriptor(), registry.clone(), Arc::new(search_and_fetch()));
        first.prepare().await;
        let second = McpAgent::new(agent_descriptor(), registry.clone(), Arc::new(search_and_fetch()));
        second.prepare().await;
        assert!(matches!(second.health(), AgentHealth::Degraded(_)));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_routes_to_named_tool_with_string_argument() {
        let transport = Arc::new(search_and_fetch());
        let agent = McpAgent::new(agent_descriptor(), Arc::new(ToolRegistry::new()), transport.clone());
        let out = agent
            .handle("search for tokio cancellation", &AgentContext::new(Uuid::new_v4()))
            .await;
        assert!(out.success, "{:?}", out.error);

        let calls = transport.calls.lock();
        assert_eq!(calls[0].0, "search");
        assert_eq!(calls[0].1, json!({"query": "search for tokio cancellation"}));
    }

    #[tokio::test]
    async fn test_embedded_json_arguments() {
        let transport = Arc::new(search_and_fetch());
        let agent = McpAgent::new(agent_descriptor(), Arc::new(ToolRegistry::new()), transport.clone());
        let out = agent
            .handle(
                r#"fetch {"url": "https://example.com", "raw": true}"#,
                &AgentContext::new(Uuid::new_v4()),
            )
            .await;
        assert!(out.success, "{:?}", out.error);
        assert_eq!(
            transport.calls.lock()[0].1,
            json!({"url": "https://example.com", "raw": true})
        );
    }

    #[tokio::test]
    async fn test_ambiguous_request() {
        let agent = McpAgent::new(
            agent_descriptor(),
            Arc::new(ToolRegistry::new()),
            Arc::new(search_and_fetch()),
        );
        let out = agent.handle("do the thing", &AgentContext::new(Uuid::new_v4())).await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("search"));
    }
}
