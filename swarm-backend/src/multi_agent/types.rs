//! Orchestration types: plans, per-subtask outputs, and the final response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who wrote a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// One prior turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// What an agent produced for a subtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubtaskPayload {
    Text(String),
    Structured(Value),
}

impl SubtaskPayload {
    /// User-facing rendering. Structured payloads show their `summary`
    /// field when present, pretty JSON otherwise.
    pub fn as_text(&self) -> String {
        match self {
            SubtaskPayload::Text(text) => text.clone(),
            SubtaskPayload::Structured(value) => value
                .get("summary")
                .and_then(|s| s.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| serde_json::to_string_pretty(value).unwrap_or_default()),
        }
    }
}

impl From<String> for SubtaskPayload {
    fn from(text: String) -> Self {
        SubtaskPayload::Text(text)
    }
}

/// Result of dispatching one subtask to one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskOutput {
    pub agent_name: String,
    pub output: Option<SubtaskPayload>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubtaskOutput {
    pub fn succeeded(agent_name: impl Into<String>, output: SubtaskPayload) -> Self {
        Self {
            agent_name: agent_name.into(),
            output: Some(output),
            success: true,
            error: None,
        }
    }

    pub fn failed(agent_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            output: None,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Text of a successful output, `None` for failures
    pub fn text(&self) -> Option<String> {
        if !self.success {
            return None;
        }
        self.output.as_ref().map(|o| o.as_text())
    }
}

/// One planned unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub agent_name: String,
    pub instructions: String,
}

impl Subtask {
    pub fn new(agent_name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            instructions: instructions.into(),
        }
    }
}

/// How the delegator arrived at a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanReason {
    /// Explicit `/command` invocation
    Command,
    /// Keyword relevance against the request text
    Relevance,
    /// Keyword relevance against the last user turn
    History,
    /// Nothing matched; the configured fallback agent was used
    Fallback,
    /// No eligible agent
    Empty,
}

impl std::fmt::Display for PlanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanReason::Command => write!(f, "command"),
            PlanReason::Relevance => write!(f, "relevance"),
            PlanReason::History => write!(f, "history"),
            PlanReason::Fallback => write!(f, "fallback"),
            PlanReason::Empty => write!(f, "empty"),
        }
    }
}

/// Ordered subtask plan produced by a delegator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskPlan {
    pub subtasks: Vec<Subtask>,
    pub reason: PlanReason,
}

impl SubtaskPlan {
    pub fn new(subtasks: Vec<Subtask>, reason: PlanReason) -> Self {
        Self { subtasks, reason }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), PlanReason::Empty)
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.subtasks.iter().map(|s| s.agent_name.as_str()).collect()
    }
}

/// Per-request orchestration phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationState {
    Planning,
    Dispatching,
    Aggregating,
    Done,
}

impl Default for OrchestrationState {
    fn default() -> Self {
        OrchestrationState::Planning
    }
}

impl std::fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestrationState::Planning => write!(f, "PLANNING"),
            OrchestrationState::Dispatching => write!(f, "DISPATCHING"),
            OrchestrationState::Aggregating => write!(f, "AGGREGATING"),
            OrchestrationState::Done => write!(f, "DONE"),
        }
    }
}

impl OrchestrationState {
    /// Planning may skip dispatch when the plan is empty
    pub fn can_transition_to(&self, next: OrchestrationState) -> bool {
        use OrchestrationState::*;
        matches!(
            (self, next),
            (Planning, Dispatching) | (Planning, Aggregating) | (Dispatching, Aggregating) | (Aggregating, Done)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub request_id: Uuid,
    pub plan_reason: PlanReason,
    /// In plan order
    pub subtask_outputs: Vec<SubtaskOutput>,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

/// Final composed answer for one request. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    success: bool,
    content: String,
    metadata: ResponseMetadata,
}

impl AgentResponse {
    pub(crate) fn new(success: bool, content: String, metadata: ResponseMetadata) -> Self {
        Self {
            success,
            content,
            metadata,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn subtask_outputs(&self) -> &[SubtaskOutput] {
        &self.metadata.subtask_outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_payload_prefers_summary() {
        let payload = SubtaskPayload::Structured(json!({"summary": "Sent 1 USDC", "tx": {}}));
        assert_eq!(payload.as_text(), "Sent 1 USDC");

        let payload = SubtaskPayload::Structured(json!({"a": 1}));
        assert!(payload.as_text().contains("\"a\": 1"));
    }

    #[test]
    fn test_failed_output_has_no_text() {
        let out = SubtaskOutput::failed("social", "boom");
        assert_eq!(out.text(), None);
        assert_eq!(out.error.as_deref(), Some("boom"));

        let out = SubtaskOutput::succeeded("social", "gm".to_string().into());
        assert_eq!(out.text().as_deref(), Some("gm"));
    }

    #[test]
    fn test_state_transitions() {
        use OrchestrationState::*;
        assert!(Planning.can_transition_to(Dispatching));
        assert!(Planning.can_transition_to(Aggregating));
        assert!(Aggregating.can_transition_to(Done));
        assert!(!Planning.can_transition_to(Done));
        assert!(!Done.can_transition_to(Planning));
        assert!(!Dispatching.can_transition_to(Dispatching));
    }

    #[test]
    fn test_chat_message_serde() {
        let msg: ChatMessage = serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(msg, ChatMessage::user("hi"));
    }
}
