//! Delegation: decide which agents handle a request.
//!
//! Pure selection logic. Nothing here calls an agent.

use super::error::OrchestrationError;
use super::types::{ChatMessage, ChatRole, PlanReason, Subtask, SubtaskPlan};
use crate::agents::AgentDescriptor;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;

/// Words that carry no routing signal
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "what", "whats", "how", "can", "you", "your", "please", "about",
        "this", "that", "from", "into", "are", "was", "is", "me", "my", "our", "give", "tell",
        "show", "current", "some", "any", "all", "get", "now", "want", "need", "would", "like",
    ]
    .into_iter()
    .collect()
});

/// Input to a delegator
#[derive(Debug, Clone, Default)]
pub struct DelegationRequest {
    pub text: String,
    pub history: Vec<ChatMessage>,
    pub has_upload: bool,
}

impl DelegationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        DelegationRequest {
            text: text.into(),
            ..Default::default()
        }
    }
}

pub trait Delegator: Send + Sync {
    /// Build an ordered plan over `agents`. An empty or all-disabled set
    /// gives an empty plan, not an error.
    fn plan(
        &self,
        request: &DelegationRequest,
        agents: &[Arc<AgentDescriptor>],
    ) -> Result<SubtaskPlan, OrchestrationError>;
}

#[derive(Debug, Clone)]
pub struct DelegatorConfig {
    pub max_subtasks: usize,
    /// Matched keywords an agent needs to be selected
    pub min_relevance: usize,
    pub fallback_agent: Option<String>,
}

impl Default for DelegatorConfig {
    fn default() -> Self {
        DelegatorConfig {
            max_subtasks: 3,
            min_relevance: 1,
            fallback_agent: None,
        }
    }
}

/// `/command` routing, then keyword overlap against `delegator_description`
pub struct KeywordDelegator {
    config: DelegatorConfig,
}

impl KeywordDelegator {
    pub fn new(config: DelegatorConfig) -> Self {
        KeywordDelegator { config }
    }

    fn eligible<'a>(
        request: &DelegationRequest,
        agents: &'a [Arc<AgentDescriptor>],
    ) -> Vec<&'a Arc<AgentDescriptor>> {
        agents
            .iter()
            .filter(|d| d.is_enabled && (!d.upload_required || request.has_upload))
            .collect()
    }

    /// `/price eth` routes to the agent whose command is `price`
    fn command_plan(text: &str, eligible: &[&Arc<AgentDescriptor>]) -> Option<SubtaskPlan> {
        let trimmed = text.trim_start();
        let rest = trimmed.strip_prefix('/')?;
        let (command, args) = match rest.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (rest, ""),
        };
        let command = command.to_lowercase();
        let agent = eligible.iter().find(|d| d.command_key() == command)?;
        let instructions = if args.is_empty() { trimmed } else { args };
        Some(SubtaskPlan::new(
            vec![Subtask::new(&agent.name, instructions)],
            PlanReason::Command,
        ))
    }

    /// Agents ranked by matched keyword count. Ties keep catalog order.
    fn rank<'a>(&self, text: &str, eligible: &[&'a Arc<AgentDescriptor>]) -> Vec<&'a Arc<AgentDescriptor>> {
        let words = keywords(text);
        if words.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(usize, &Arc<AgentDescriptor>)> = eligible
            .iter()
            .map(|d| (relevance(&words, d), *d))
            .filter(|(score, _)| *score >= self.config.min_relevance.max(1))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(self.config.max_subtasks.max(1))
            .map(|(_, d)| d)
            .collect()
    }
}

impl Delegator for KeywordDelegator {
    fn plan(
        &self,
        request: &DelegationRequest,
        agents: &[Arc<AgentDescriptor>],
    ) -> Result<SubtaskPlan, OrchestrationError> {
        let eligible = Self::eligible(request, agents);
        if eligible.is_empty() {
            log::debug!("[DELEGATOR] No eligible agents");
            return Ok(SubtaskPlan::empty());
        }

        if let Some(plan) = Self::command_plan(&request.text, &eligible) {
            log::debug!("[DELEGATOR] Command routed to {:?}", plan.agent_names());
            return Ok(plan);
        }

        let to_plan = |selected: Vec<&Arc<AgentDescriptor>>, reason| {
            let subtasks = selected
                .into_iter()
                .map(|d| Subtask::new(&d.name, request.text.trim()))
                .collect();
            SubtaskPlan::new(subtasks, reason)
        };

        let selected = self.rank(&request.text, &eligible);
        if !selected.is_empty() {
            let plan = to_plan(selected, PlanReason::Relevance);
            log::debug!("[DELEGATOR] Relevance selected {:?}", plan.agent_names());
            return Ok(plan);
        }

        // Follow-ups like "and in euros?" lean on the previous user turn
        if let Some(previous) = request.history.iter().rev().find(|m| m.role == ChatRole::User) {
            let selected = self.rank(&previous.content, &eligible);
            if !selected.is_empty() {
                let plan = to_plan(selected, PlanReason::History);
                log::debug!("[DELEGATOR] History selected {:?}", plan.agent_names());
                return Ok(plan);
            }
        }

        if let Some(fallback) = &self.config.fallback_agent {
            if let Some(agent) = eligible.iter().find(|d| &d.name == fallback) {
                log::debug!("[DELEGATOR] Falling back to '{}'", agent.name);
                return Ok(to_plan(vec![*agent], PlanReason::Fallback));
            }
            log::warn!("[DELEGATOR] Fallback agent '{}' is not eligible", fallback);
        }

        log::debug!("[DELEGATOR] Nothing matched");
        Ok(SubtaskPlan::empty())
    }
}

/// Lowercased, de-pluralized content words of length >= 3
fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 3 && !STOP_WORDS.contains(w.as_str()))
        .map(|w| stem(&w))
        .collect()
}

fn stem(word: &str) -> String {
    match word.strip_suffix('s') {
        Some(base) if base.chars().count() >= 3 && !base.ends_with('s') => base.to_string(),
        _ => word.to_string(),
    }
}

fn relevance(words: &HashSet<String>, descriptor: &AgentDescriptor) -> usize {
    keywords(&descriptor.delegator_description)
        .intersection(words)
        .count()
}
