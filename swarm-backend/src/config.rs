use crate::multi_agent::{DelegatorConfig, OrchestratorConfig};
use crate::tools::builtin::price_lookup::{DEFAULT_PRICE_API_URL, PRICE_API_KEY, PRICE_API_URL_SETTING};
use crate::tools::types::ToolContext;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a valid number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub request_timeout_secs: u64,
    pub subtask_timeout_secs: u64,
    pub max_subtasks: usize,
    pub min_relevance: usize,
    pub fallback_agent: Option<String>,
    pub price_api_url: String,
    pub price_api_key: Option<String>,
    pub mcp_timeout_secs: u64,
    pub disabled_agents: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let request_timeout_secs = positive(&var, "REQUEST_TIMEOUT_SECS", 60)?;
        Ok(Self {
            port: number(&var, "PORT", 8080)?,
            request_timeout_secs,
            subtask_timeout_secs: positive(&var, "SUBTASK_TIMEOUT_SECS", request_timeout_secs)?,
            max_subtasks: positive(&var, "MAX_SUBTASKS", 3)?,
            min_relevance: positive(&var, "MIN_RELEVANCE", 1)?,
            fallback_agent: var("FALLBACK_AGENT"),
            price_api_url: var("PRICE_API_URL").unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string()),
            price_api_key: var("PRICE_API_KEY"),
            mcp_timeout_secs: positive(&var, "MCP_TIMEOUT_SECS", 15)?,
            disabled_agents: var("DISABLED_AGENTS")
                .map(|list| {
                    list.split(',')
                        .map(|name| name.trim().to_string())
                        .filter(|name| !name.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn delegator_config(&self) -> DelegatorConfig {
        DelegatorConfig {
            max_subtasks: self.max_subtasks,
            min_relevance: self.min_relevance,
            fallback_agent: self.fallback_agent.clone(),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut tool_context = ToolContext::new().with_setting(PRICE_API_URL_SETTING, self.price_api_url.clone());
        if let Some(key) = &self.price_api_key {
            tool_context = tool_context.with_api_key(PRICE_API_KEY, key.clone());
        }
        OrchestratorConfig {
            subtask_timeout: Duration::from_secs(self.subtask_timeout_secs),
            tool_context,
        }
    }

    pub fn mcp_timeout(&self) -> Duration {
        Duration::from_secs(self.mcp_timeout_secs)
    }
}

fn number<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var: key, value }),
    }
}

fn positive<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    F: Fn(&str) -> Option<String>,
{
    let value = number(var, key, default)?;
    if value == T::default() {
        return Err(ConfigError::Zero { var: key });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.request_timeout_secs, 60);
        assert_eq!(c.subtask_timeout_secs, 60);
        assert_eq!(c.max_subtasks, 3);
        assert_eq!(c.min_relevance, 1);
        assert_eq!(c.mcp_timeout_secs, 15);
        assert_eq!(c.price_api_url, DEFAULT_PRICE_API_URL);
        assert!(c.fallback_agent.is_none());
        assert!(c.disabled_agents.is_empty());
    }

    #[test]
    fn test_subtask_timeout_follows_request_timeout() {
        let c = config(&[("REQUEST_TIMEOUT_SECS", "20")]).unwrap();
        assert_eq!(c.subtask_timeout_secs, 20);
        let c = config(&[("REQUEST_TIMEOUT_SECS", "20"), ("SUBTASK_TIMEOUT_SECS", "5")]).unwrap();
        assert_eq!(c.orchestrator_config().subtask_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_numbers() {
        assert_eq!(
            config(&[("PORT", "eighty")]).unwrap_err(),
            ConfigError::InvalidNumber {
                var: "PORT",
                value: "eighty".to_string()
            }
        );
        assert_eq!(
            config(&[("MAX_SUBTASKS", "0")]).unwrap_err(),
            ConfigError::Zero { var: "MAX_SUBTASKS" }
        );
    }

    #[test]
    fn test_lists_and_keys() {
        let c = config(&[
            ("DISABLED_AGENTS", " social, ,blockchain "),
            ("FALLBACK_AGENT", "crypto_data"),
            ("PRICE_API_KEY", "k-123"),
        ])
        .unwrap();
        assert_eq!(c.disabled_agents, vec!["social", "blockchain"]);
        assert_eq!(c.delegator_config().fallback_agent.as_deref(), Some("crypto_data"));
        assert_eq!(
            c.orchestrator_config().tool_context.get_api_key(PRICE_API_KEY).as_deref(),
            Some("k-123")
        );
    }
}
