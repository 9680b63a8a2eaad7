//! Request orchestration
//!
//! ```text
//! request → Delegator (plan) → Agents (concurrent, bounded) → aggregate → AgentResponse
//! ```
//!
//! States per request: `PLANNING → DISPATCHING → AGGREGATING → DONE`; an
//! empty plan goes straight from planning to aggregating.
//!
//! Failure policy: agent and tool failures become failed `SubtaskOutput`s and
//! the response stays `success = true`, prefixed with an apology when any
//! subtask failed. Only `OrchestrationError` (delegator failure, a plan
//! naming an unknown agent, cancellation) escapes `orchestrate`.

pub mod delegator;
pub mod error;
pub mod orchestrator;
pub mod types;

pub use delegator::{DelegationRequest, Delegator, DelegatorConfig, KeywordDelegator};
pub use error::OrchestrationError;
pub use orchestrator::{OrchestrationRequest, Orchestrator, OrchestratorConfig, APOLOGY, EMPTY_PLAN_CONTENT};
pub use types::{AgentResponse, ChatMessage, ChatRole, SubtaskOutput, SubtaskPayload, SubtaskPlan};
