//! Turns descriptors into live agents through a compiled-in factory table.

use super::blockchain::BlockchainAgent;
use super::catalog::{AgentCatalog, CatalogError};
use super::crypto_data::CryptoDataAgent;
use super::descriptor::AgentDescriptor;
use super::mcp::McpAgent;
use super::social::SocialAgent;
use super::{Agent, AgentHealth};
use crate::mcp::client::McpTransport;
use crate::tools::registry::ToolRegistry;
use std::collections::HashMap;
use std::sync::Arc;

type LocalAgentFactory = fn(Arc<AgentDescriptor>, &ToolRegistry) -> Result<Arc<dyn Agent>, CatalogError>;

/// Local agent implementations, keyed by descriptor name
const LOCAL_AGENT_FACTORIES: &[(&str, LocalAgentFactory)] = &[
    ("blockchain", BlockchainAgent::build),
    ("crypto_data", CryptoDataAgent::build),
    ("social", SocialAgent::build),
];

fn local_factory(name: &str) -> Option<LocalAgentFactory> {
    LOCAL_AGENT_FACTORIES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, factory)| *factory)
}

/// Live agents by name. Built once at startup, read-only afterwards.
pub struct AgentRoster {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRoster {
    /// Build an agent for every enabled descriptor
    pub fn build(
        catalog: &AgentCatalog,
        registry: Arc<ToolRegistry>,
        transport: Arc<dyn McpTransport>,
    ) -> Result<Self, CatalogError> {
        let mut agents: Vec<Arc<dyn Agent>> = Vec::new();
        for descriptor in catalog.enabled() {
            let agent: Arc<dyn Agent> = if descriptor.is_mcp() {
                Arc::new(McpAgent::new(descriptor.clone(), registry.clone(), transport.clone()))
            } else {
                let factory = local_factory(&descriptor.name)
                    .ok_or_else(|| CatalogError::MissingFactory(descriptor.name.clone()))?;
                factory(descriptor.clone(), &registry)?
            };
            log::debug!("[ROSTER] Built agent '{}'", descriptor.name);
            agents.push(agent);
        }
        log::info!("[ROSTER] {} agents ready to serve", agents.len());
        Ok(Self::from_agents(agents))
    }

    pub fn from_agents(agents: Vec<Arc<dyn Agent>>) -> Self {
        AgentRoster {
            agents: agents
                .into_iter()
                .map(|a| (a.name().to_string(), a))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    /// Run every agent's one-time setup concurrently (MCP discovery)
    pub async fn warm_up(&self) {
        futures_util::future::join_all(self.agents.values().map(|a| a.prepare())).await;
        for (name, health) in self.health() {
            match health {
                AgentHealth::Degraded(reason) => {
                    log::warn!("[ROSTER] Agent '{}' is degraded: {}", name, reason)
                }
                other => log::debug!("[ROSTER] Agent '{}': {:?}", name, other),
            }
        }
    }

    /// Health of every agent, sorted by name
    pub fn health(&self) -> Vec<(String, AgentHealth)> {
        let mut all: Vec<_> = self
            .agents
            .iter()
            .map(|(name, agent)| (name.clone(), agent.health()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::tests::FakeTransport;

    fn bootstrapped_registry() -> Arc<ToolRegistry> {
        let registry = Arc::new(ToolRegistry::new());
        registry.bootstrap().unwrap();
        registry
    }

    #[test]
    fn test_every_builtin_local_agent_has_a_factory() {
        let catalog = AgentCatalog::builtin().unwrap();
        for d in catalog.all().iter().filter(|d| !d.is_mcp()) {
            assert!(local_factory(&d.name).is_some(), "no factory for {}", d.name);
        }
    }

    #[tokio::test]
    async fn test_build_builtin_roster() {
        let registry = bootstrapped_registry();
        let roster = AgentRoster::build(
            &AgentCatalog::builtin().unwrap(),
            registry,
            Arc::new(FakeTransport::with_tools(vec![])),
        )
        .unwrap();
        assert_eq!(roster.len(), 3);
        assert!(roster.get("mcp_tools").is_none());
        roster.warm_up().await;
        assert!(roster.health().iter().all(|(_, h)| *h == AgentHealth::Ready));
    }

    #[test]
    fn test_enabled_agent_without_factory_is_rejected() {
        let catalog = AgentCatalog::from_ron_str(
            r#"[(name: "mystery", human_readable_name: "Mystery", command: "m", description: "",
                delegator_description: "", tools: ["token_lookup"])]"#,
        )
        .unwrap();
        let err = AgentRoster::build(
            &catalog,
            bootstrapped_registry(),
            Arc::new(FakeTransport::with_tools(vec![])),
        )
        .err();
        assert!(matches!(err, Some(CatalogError::MissingFactory(name)) if name == "mystery"));
    }

    #[test]
    fn test_unknown_capability_is_rejected() {
        let catalog = AgentCatalog::from_ron_str(
            r#"[(name: "social", human_readable_name: "Social", command: "post", description: "",
                delegator_description: "", tools: ["social/launch_rocket"])]"#,
        )
        .unwrap();
        let err = AgentRoster::build(
            &catalog,
            bootstrapped_registry(),
            Arc::new(FakeTransport::with_tools(vec![])),
        )
        .err();
        assert!(matches!(err, Some(CatalogError::Tool { .. })));
    }
}
