use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Static description of an agent, loaded once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique key used in plans and API calls
    pub name: String,
    pub human_readable_name: String,
    /// Slash command that routes straight to this agent (without the slash)
    pub command: String,
    pub description: String,
    /// Routing text the delegator scores requests against
    pub delegator_description: String,
    /// Declared tool capabilities (`name` or `category/name`). Empty for MCP
    /// agents, whose tools are discovered at first use.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub upload_required: bool,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub mcp_server_url: Option<String>,
}

impl AgentDescriptor {
    pub fn is_mcp(&self) -> bool {
        self.mcp_server_url.is_some()
    }

    /// `command` normalized for matching: lowercase, no leading slash
    pub fn command_key(&self) -> String {
        self.command.trim().trim_start_matches('/').to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ron_defaults() {
        let descriptor: AgentDescriptor = ron::from_str(
            r#"(
                name: "social",
                human_readable_name: "Social",
                command: "/Social",
                description: "Writes posts",
                delegator_description: "tweets and posts",
            )"#,
        )
        .unwrap();
        assert!(descriptor.is_enabled);
        assert!(!descriptor.upload_required);
        assert!(descriptor.tools.is_empty());
        assert!(!descriptor.is_mcp());
        assert_eq!(descriptor.command_key(), "social");
    }
}
