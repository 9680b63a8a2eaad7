//! Agents: units that fulfil one subtask using tools from the registry.

pub mod blockchain;
pub mod catalog;
pub mod crypto_data;
pub mod descriptor;
pub mod mcp;
pub mod roster;
pub mod social;

pub use catalog::{AgentCatalog, CatalogError};
pub use descriptor::AgentDescriptor;
pub use roster::AgentRoster;

use crate::multi_agent::types::{ChatMessage, SubtaskOutput, SubtaskPayload};
use crate::tools::error::ToolError;
use crate::tools::registry::{ToolHandle, ToolRegistry};
use crate::tools::types::ToolContext;
use async_trait::async_trait;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("no tool matches the request: {0}")]
    NoMatchingTool(String),

    #[error("could not understand the request: {0}")]
    InvalidInstructions(String),

    #[error("agent unavailable: {0}")]
    Degraded(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum AgentHealth {
    Ready,
    /// Capabilities not discovered yet
    Pending,
    Degraded(String),
}

/// Per-request data handed to every agent
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub request_id: Uuid,
    pub history: Vec<ChatMessage>,
    pub has_upload: bool,
    pub tools: ToolContext,
}

impl AgentContext {
    pub fn new(request_id: Uuid) -> Self {
        AgentContext {
            request_id,
            history: Vec::new(),
            has_upload: false,
            tools: ToolContext::new().with_request(request_id),
        }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn health(&self) -> AgentHealth {
        AgentHealth::Ready
    }

    /// One-time setup before serving requests (capability discovery)
    async fn prepare(&self) {}

    /// Do the work. Errors are fine here; `handle` converts them.
    async fn run(&self, instructions: &str, context: &AgentContext) -> Result<SubtaskPayload, AgentError>;

    /// Never fails outward: errors and panics become a failed output
    async fn handle(&self, instructions: &str, context: &AgentContext) -> SubtaskOutput {
        capture(self.name(), context.request_id, self.run(instructions, context)).await
    }
}

/// Run an agent future and fold every failure mode into a `SubtaskOutput`.
/// This is the one place agent failures get logged.
pub async fn capture<F>(agent_name: &str, request_id: Uuid, work: F) -> SubtaskOutput
where
    F: Future<Output = Result<SubtaskPayload, AgentError>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(Ok(payload)) => SubtaskOutput::succeeded(agent_name, payload),
        Ok(Err(e)) => {
            log::warn!("[AGENT] {} failed (request {}): {}", agent_name, request_id, e);
            SubtaskOutput::failed(agent_name, e.to_string())
        }
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::warn!("[AGENT] {} panicked (request {}): {}", agent_name, request_id, detail);
            SubtaskOutput::failed(agent_name, format!("internal error in {}", agent_name))
        }
    }
}

/// Tools a local agent resolved from the registry at construction
#[derive(Debug, Clone)]
pub struct LocalToolset {
    handles: Vec<ToolHandle>,
}

impl LocalToolset {
    pub fn resolve(registry: &ToolRegistry, descriptor: &AgentDescriptor) -> Result<Self, ToolError> {
        Ok(LocalToolset {
            handles: registry.tools_for_agent(&descriptor.tools)?,
        })
    }

    pub fn handles(&self) -> &[ToolHandle] {
        &self.handles
    }

    /// Look up a resolved tool by bare or qualified name
    pub fn require(&self, name: &str) -> Result<&ToolHandle, AgentError> {
        self.handles
            .iter()
            .find(|h| h.name() == name || h.qualified_name() == name)
            .ok_or_else(|| AgentError::NoMatchingTool(format!("'{}' is not in this agent's toolset", name)))
    }

    /// Shorthand for `require(name)?.invoke(..)`
    pub async fn call(&self, name: &str, params: Value, context: &ToolContext) -> Result<crate::tools::types::ToolOutput, AgentError> {
        Ok(self.require(name)?.invoke(params, context).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_success() {
        let out = capture("a", Uuid::new_v4(), async { Ok(SubtaskPayload::Text("done".into())) }).await;
        assert!(out.success);
        assert_eq!(out.text().as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_capture_error() {
        let out = capture("a", Uuid::new_v4(), async {
            Err(AgentError::Tool(ToolError::execution("swap", "pool empty")))
        })
        .await;
        assert!(!out.success);
        assert!(out.output.is_none());
        assert!(out.error.unwrap().contains("pool empty"));
    }

    #[tokio::test]
    async fn test_capture_panic() {
        let out = capture("a", Uuid::new_v4(), async {
            if true {
                panic!("boom");
            }
            Ok(SubtaskPayload::Text(String::new()))
        })
        .await;
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("internal error in a"));
    }

    #[test]
    fn test_toolset_require() {
        use crate::tools::registry::tests::MockTool;
        use crate::tools::types::ToolCategory;
        use std::sync::Arc;

        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(MockTool::ok("price_lookup", "42")), ToolCategory::Data)
            .unwrap();
        let descriptor: AgentDescriptor = ron::from_str(
            r#"(name: "d", human_readable_name: "D", command: "d", description: "", delegator_description: "", tools: ["data/price_lookup"])"#,
        )
        .unwrap();
        let toolset = LocalToolset::resolve(&registry, &descriptor).unwrap();
        assert!(toolset.require("price_lookup").is_ok());
        assert!(toolset.require("data/price_lookup").is_ok());
        assert!(matches!(toolset.require("swap"), Err(AgentError::NoMatchingTool(_))));
    }
}
