use super::{Agent, AgentContext, AgentDescriptor, AgentError, CatalogError, LocalToolset};
use crate::multi_agent::types::SubtaskPayload;
use crate::tools::registry::ToolRegistry;
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;

/// "please write a tweet about", "post:", "draft a thread on" ...
const PREFIX_PATTERN: &str = r"(?i)^\s*/?(?:please\s+)?(?:(?:write|draft|compose|create|make)\s+(?:me\s+)?(?:(?:an|a)\s+)?(?:(?:tweet|post|thread)\b)?|tweet\b|post\b)\s*(?:(?:about|on|for|saying|that)\b)?\s*[:,\-]?\s*";
const HASHTAG_PATTERN: &str = r"#(\w+)";

/// Drafts social posts from free text
pub struct SocialAgent {
    descriptor: Arc<AgentDescriptor>,
    tools: LocalToolset,
    prefix: Regex,
    hashtag: Regex,
}

impl SocialAgent {
    pub fn build(descriptor: Arc<AgentDescriptor>, registry: &ToolRegistry) -> Result<Arc<dyn Agent>, CatalogError> {
        let tools = LocalToolset::resolve(registry, &descriptor).map_err(|source| CatalogError::Tool {
            agent: descriptor.name.clone(),
            source,
        })?;
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| CatalogError::Invalid {
                agent: descriptor.name.clone(),
                reason: e.to_string(),
            })
        };
        Ok(Arc::new(SocialAgent {
            prefix: compile(PREFIX_PATTERN)?,
            hashtag: compile(HASHTAG_PATTERN)?,
            descriptor,
            tools,
        }))
    }

    /// Split a request into (topic, hashtags)
    fn extract(&self, text: &str) -> (String, Vec<String>) {
        let hashtags: Vec<String> = self
            .hashtag
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .collect();
        let without_tags = self.hashtag.replace_all(text, "");
        let topic = self.prefix.replace(&without_tags, "");
        (topic.trim().to_string(), hashtags)
    }
}

#[async_trait]
impl Agent for SocialAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn run(&self, instructions: &str, context: &AgentContext) -> Result<SubtaskPayload, AgentError> {
        let (topic, hashtags) = self.extract(instructions);
        if topic.is_empty() && hashtags.is_empty() {
            return Err(AgentError::InvalidInstructions("what should the post be about?".to_string()));
        }
        let out = self
            .tools
            .call("compose_post", json!({"topic": topic, "hashtags": hashtags}), &context.tools)
            .await?;
        Ok(SubtaskPayload::Text(out.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::ComposePostTool;
    use crate::tools::types::ToolCategory;
    use uuid::Uuid;

    fn agent() -> Arc<dyn Agent> {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(ComposePostTool::new()), ToolCategory::Social)
            .unwrap();
        let descriptor: AgentDescriptor = ron::from_str(
            r#"(name: "social", human_readable_name: "Social", command: "post", description: "",
                delegator_description: "tweet", tools: ["social/compose_post"])"#,
        )
        .unwrap();
        SocialAgent::build(Arc::new(descriptor), &registry).unwrap()
    }

    #[tokio::test]
    async fn test_strips_prefix_and_keeps_tags() {
        let out = agent()
            .handle(
                "Write a tweet about the new Base bridge #base #L2",
                &AgentContext::new(Uuid::new_v4()),
            )
            .await;
        assert_eq!(out.text().as_deref(), Some("The new Base bridge #base #L2"));
    }

    #[tokio::test]
    async fn test_bare_topic() {
        let out = agent()
            .handle("gm to all builders", &AgentContext::new(Uuid::new_v4()))
            .await;
        assert_eq!(out.text().as_deref(), Some("Gm to all builders"));
    }

    #[tokio::test]
    async fn test_empty_request() {
        let out = agent().handle("tweet", &AgentContext::new(Uuid::new_v4())).await;
        assert!(!out.success);
    }
}
