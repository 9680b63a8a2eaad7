//! Orchestrator: Delegator → Agent(s) → one composed response.

use super::delegator::{DelegationRequest, Delegator};
use super::error::OrchestrationError;
use super::types::{
    AgentResponse, ChatMessage, OrchestrationState, ResponseMetadata, Subtask, SubtaskOutput,
};
use crate::agents::{Agent, AgentContext, AgentDescriptor, AgentRoster};
use crate::tools::types::ToolContext;
use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Shown whenever at least one subtask failed
pub const APOLOGY: &str = "I'm sorry, I wasn't able to complete every part of your request.";

/// Content for a request no agent was selected for
pub const EMPTY_PLAN_CONTENT: &str = "Request completed.";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound for a single agent's `handle`
    pub subtask_timeout: Duration,
    /// Settings and keys copied into every request's tool context
    pub tool_context: ToolContext,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            subtask_timeout: Duration::from_secs(60),
            tool_context: ToolContext::new(),
        }
    }
}

/// One inbound request
#[derive(Debug, Clone, Default)]
pub struct OrchestrationRequest {
    pub text: String,
    pub history: Vec<ChatMessage>,
    pub has_upload: bool,
}

impl OrchestrationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        OrchestrationRequest {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_upload(mut self, has_upload: bool) -> Self {
        self.has_upload = has_upload;
        self
    }
}

/// Per-request state machine. Lives for one `orchestrate` call.
struct RequestRun {
    request_id: Uuid,
    state: OrchestrationState,
}

impl RequestRun {
    fn new() -> Self {
        RequestRun {
            request_id: Uuid::new_v4(),
            state: OrchestrationState::Planning,
        }
    }

    fn advance(&mut self, next: OrchestrationState) -> Result<(), OrchestrationError> {
        if !self.state.can_transition_to(next) {
            return Err(OrchestrationError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        log::debug!("[ORCHESTRATOR] {} {} -> {}", self.request_id, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Drives requests through planning, dispatch and aggregation. Shared
/// across requests; holds no per-request state.
pub struct Orchestrator {
    delegator: Arc<dyn Delegator>,
    roster: Arc<AgentRoster>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(delegator: Arc<dyn Delegator>, roster: Arc<AgentRoster>, config: OrchestratorConfig) -> Self {
        Orchestrator {
            delegator,
            roster,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn orchestrate(
        &self,
        request_text: &str,
        chat_history: &[ChatMessage],
        enabled_agents: &[Arc<AgentDescriptor>],
    ) -> Result<AgentResponse, OrchestrationError> {
        let request = OrchestrationRequest::new(request_text).with_history(chat_history.to_vec());
        self.orchestrate_request(request, enabled_agents, &CancellationToken::new())
            .await
    }

    /// Full entry point. Cancelling `cancel` abandons in-flight subtasks and
    /// discards any outputs already collected.
    pub async fn orchestrate_request(
        &self,
        request: OrchestrationRequest,
        enabled_agents: &[Arc<AgentDescriptor>],
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, OrchestrationError> {
        let started = Instant::now();
        let mut run = RequestRun::new();
        let request_id = run.request_id;

        let delegation = DelegationRequest {
            text: request.text,
            history: request.history,
            has_upload: request.has_upload,
        };
        let plan = self.delegator.plan(&delegation, enabled_agents)?;
        log::info!(
            "[ORCHESTRATOR] {} planned {} subtask(s) by {}: {:?}",
            request_id,
            plan.len(),
            plan.reason,
            plan.agent_names()
        );

        let (outputs, labels) = if plan.is_empty() {
            run.advance(OrchestrationState::Aggregating)?;
            (Vec::new(), Vec::new())
        } else {
            let agents = plan
                .subtasks
                .iter()
                .map(|s| {
                    self.roster
                        .get(&s.agent_name)
                        .ok_or_else(|| OrchestrationError::UnknownAgent(s.agent_name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            run.advance(OrchestrationState::Dispatching)?;

            let context = AgentContext {
                request_id,
                history: delegation.history,
                has_upload: delegation.has_upload,
                tools: self.config.tool_context.clone().with_request(request_id),
            };
            let dispatch = join_all(
                plan.subtasks
                    .iter()
                    .zip(agents.iter())
                    .map(|(subtask, agent)| self.dispatch(agent.as_ref(), subtask, &context)),
            );
            let outputs = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("[ORCHESTRATOR] {} cancelled during dispatch", request_id);
                    return Err(OrchestrationError::Cancelled);
                }
                outputs = dispatch => outputs,
            };
            run.advance(OrchestrationState::Aggregating)?;

            let labels = agents
                .iter()
                .map(|a| a.descriptor().human_readable_name.clone())
                .collect();
            (outputs, labels)
        };

        let content = aggregate(&outputs, &labels);
        let failed = outputs.iter().filter(|o| !o.success).count();
        run.advance(OrchestrationState::Done)?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "[ORCHESTRATOR] {} done in {}ms ({} ok, {} failed)",
            request_id,
            elapsed_ms,
            outputs.len() - failed,
            failed
        );

        Ok(AgentResponse::new(
            true,
            content,
            ResponseMetadata {
                request_id,
                plan_reason: plan.reason,
                subtask_outputs: outputs,
                elapsed_ms,
                completed_at: Utc::now(),
            },
        ))
    }

    async fn dispatch(&self, agent: &dyn Agent, subtask: &Subtask, context: &AgentContext) -> SubtaskOutput {
        let timeout = self.config.subtask_timeout;
        match tokio::time::timeout(timeout, agent.handle(&subtask.instructions, context)).await {
            Ok(output) => output,
            Err(_) => {
                log::warn!(
                    "[ORCHESTRATOR] {} subtask for '{}' timed out after {:?}",
                    context.request_id,
                    subtask.agent_name,
                    timeout
                );
                SubtaskOutput::failed(
                    &subtask.agent_name,
                    format!("timed out after {}ms", timeout.as_millis()),
                )
            }
        }
    }
}

/// Fold outputs (in plan order) into user-facing text. `labels[i]` names
/// the agent behind `outputs[i]`.
fn aggregate(outputs: &[SubtaskOutput], labels: &[String]) -> String {
    if outputs.is_empty() {
        return EMPTY_PLAN_CONTENT.to_string();
    }

    let successes: Vec<(&str, String)> = outputs
        .iter()
        .zip(labels.iter())
        .filter_map(|(output, label)| Some((label.as_str(), output.text()?)))
        .collect();

    let body = match successes.as_slice() {
        [] => None,
        [(_, text)] => Some(text.clone()),
        many => Some(
            many.iter()
                .map(|(label, text)| format!("**{}**\n{}", label, text))
                .collect::<Vec<_>>()
                .join("\n\n"),
        ),
    };

    let all_succeeded = successes.len() == outputs.len();
    match (all_succeeded, body) {
        (true, Some(body)) => body,
        (false, Some(body)) => format!("{}\n\n{}", APOLOGY, body),
        (_, None) => APOLOGY.to_string(),
    }
}
