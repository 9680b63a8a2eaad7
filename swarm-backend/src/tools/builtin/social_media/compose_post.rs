//! Drafts a short social post. Posting is left to the user.

use crate::tools::error::ToolError;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolOutput,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

pub const MAX_POST_CHARS: usize = 280;

pub struct ComposePostTool {
    definition: ToolDefinition,
}

impl ComposePostTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "topic".to_string(),
            PropertySchema::string("What the post should say"),
        );
        properties.insert(
            "hashtags".to_string(),
            PropertySchema::string_array("Hashtags to append, with or without '#'", "Hashtag"),
        );

        ComposePostTool {
            definition: ToolDefinition {
                name: "compose_post".to_string(),
                description: format!(
                    "Draft a social media post of at most {} characters.",
                    MAX_POST_CHARS
                ),
                input_schema: ToolInputSchema::new(properties, &["topic"]).into(),
            },
        }
    }
}

impl Default for ComposePostTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Body characters kept ahead of hashtags when both compete for space
const MIN_BODY_CHARS: usize = 20;

/// Build the post text, never longer than `MAX_POST_CHARS`. Hashtags are
/// kept in order while they fit next to a minimal body; the rest are dropped,
/// then the body is truncated to the remaining space.
pub fn compose(topic: &str, hashtags: &[String]) -> String {
    let mut body: String = topic.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(first) = body.chars().next() {
        body = first.to_uppercase().collect::<String>() + &body[first.len_utf8()..];
    }

    let body_chars = body.chars().count();
    let body_floor = if body_chars == 0 { 0 } else { body_chars.min(MIN_BODY_CHARS) + 1 };
    let tag_room = MAX_POST_CHARS.saturating_sub(body_floor);

    let mut tag_line = String::new();
    let mut tag_chars = 0;
    for tag in hashtags
        .iter()
        .map(|t| t.trim().trim_start_matches('#'))
        .filter(|t| !t.is_empty())
    {
        let extra = tag.chars().count() + 1 + usize::from(tag_chars > 0);
        if tag_chars + extra > tag_room {
            log::debug!("[compose_post] Dropping hashtag '{}', no room left", tag);
            continue;
        }
        if tag_chars > 0 {
            tag_line.push(' ');
        }
        tag_line.push('#');
        tag_line.push_str(tag);
        tag_chars += extra;
    }

    let reserved = if tag_chars == 0 { 0 } else { tag_chars + 1 };
    let budget = MAX_POST_CHARS.saturating_sub(reserved);
    if body_chars > budget {
        body = body.chars().take(budget.saturating_sub(1)).collect::<String>();
        body = body.trim_end().to_string() + "…";
    }

    match (body.is_empty(), tag_line.is_empty()) {
        (_, true) => body,
        (true, false) => tag_line,
        (false, false) => format!("{} {}", body, tag_line),
    }
}

#[derive(Debug, Deserialize)]
struct ComposePostParams {
    topic: String,
    #[serde(default)]
    hashtags: Vec<String>,
}

#[async_trait]
impl Tool for ComposePostTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params: ComposePostParams = serde_json::from_value(params)
            .map_err(|e| ToolError::validation("compose_post", e.to_string()))?;
        let post = compose(&params.topic, &params.hashtags);
        if post.is_empty() {
            return Err(ToolError::execution("compose_post", "nothing to post about"));
        }
        let length = post.chars().count();
        Ok(ToolOutput::success(post).with_metadata(json!({ "length": length })))
    }
}
