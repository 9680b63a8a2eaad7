//! Loading and validation of agent descriptors.

use super::descriptor::AgentDescriptor;
use crate::mcp::client::validate_server_url;
use crate::tools::error::ToolError;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

const BUILTIN_AGENTS: &str = include_str!("../../config/agents.ron");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse agent descriptors: {0}")]
    Parse(String),

    #[error("agent '{agent}': {reason}")]
    Invalid { agent: String, reason: String },

    #[error("duplicate agent {field} '{value}'")]
    Duplicate { field: &'static str, value: String },

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("agent '{0}' is enabled but has no local implementation")]
    MissingFactory(String),

    #[error("agent '{agent}' cannot resolve its tools: {source}")]
    Tool {
        agent: String,
        #[source]
        source: ToolError,
    },
}

/// Immutable, validated set of agent descriptors
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    descriptors: Vec<Arc<AgentDescriptor>>,
}

impl AgentCatalog {
    pub fn new(descriptors: Vec<AgentDescriptor>) -> Result<Self, CatalogError> {
        validate(&descriptors)?;
        Ok(AgentCatalog {
            descriptors: descriptors.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn from_ron_str(source: &str) -> Result<Self, CatalogError> {
        let descriptors: Vec<AgentDescriptor> =
            ron::from_str(source).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(descriptors)
    }

    /// Descriptors shipped with the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        let catalog = Self::from_ron_str(BUILTIN_AGENTS)?;
        log::info!(
            "[CATALOG] Loaded {} agents ({} enabled)",
            catalog.len(),
            catalog.enabled().len()
        );
        Ok(catalog)
    }

    /// Copy with the named agents forced disabled. Unknown names are logged
    /// and ignored.
    pub fn with_disabled(self, names: &[String]) -> Self {
        for name in names {
            if !self.descriptors.iter().any(|d| &d.name == name) {
                log::warn!("[CATALOG] Cannot disable unknown agent '{}'", name);
            }
        }
        let descriptors = self
            .descriptors
            .into_iter()
            .map(|d| {
                if d.is_enabled && names.contains(&d.name) {
                    log::info!("[CATALOG] Agent '{}' disabled by configuration", d.name);
                    Arc::new(AgentDescriptor {
                        is_enabled: false,
                        ..(*d).clone()
                    })
                } else {
                    d
                }
            })
            .collect();
        AgentCatalog { descriptors }
    }

    pub fn all(&self) -> &[Arc<AgentDescriptor>] {
        &self.descriptors
    }

    pub fn enabled(&self) -> Vec<Arc<AgentDescriptor>> {
        self.descriptors.iter().filter(|d| d.is_enabled).cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<AgentDescriptor>> {
        self.descriptors.iter().find(|d| d.name == name).cloned()
    }

    /// Resolve a caller-chosen subset, keeping the caller's order
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<AgentDescriptor>>, CatalogError> {
        names
            .iter()
            .map(|name| self.get(name).ok_or_else(|| CatalogError::UnknownAgent(name.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn validate(descriptors: &[AgentDescriptor]) -> Result<(), CatalogError> {
    let mut names = HashSet::new();
    let mut commands = HashSet::new();

    for d in descriptors {
        let invalid = |reason: &str| CatalogError::Invalid {
            agent: d.name.clone(),
            reason: reason.to_string(),
        };

        if d.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if d.human_readable_name.trim().is_empty() {
            return Err(invalid("human_readable_name is empty"));
        }
        if d.command_key().is_empty() || d.command_key().contains(char::is_whitespace) {
            return Err(invalid("command must be a single non-empty word"));
        }
        if !names.insert(d.name.clone()) {
            return Err(CatalogError::Duplicate {
                field: "name",
                value: d.name.clone(),
            });
        }
        if !commands.insert(d.command_key()) {
            return Err(CatalogError::Duplicate {
                field: "command",
                value: d.command.clone(),
            });
        }

        match &d.mcp_server_url {
            Some(url) => {
                validate_server_url(url).map_err(|e| invalid(&e.to_string()))?;
                if !d.tools.is_empty() {
                    return Err(invalid("MCP agents discover their tools and must not declare any"));
                }
            }
            None if d.tools.is_empty() => {
                return Err(invalid("local agents must declare at least one tool"));
            }
            None => {}
        }
    }
    Ok(())
}
