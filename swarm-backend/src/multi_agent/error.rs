use super::types::OrchestrationState;
use thiserror::Error;

/// Conditions that make a whole request unservable. Agent and tool
/// failures never surface here; they are folded into the response.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("delegation failed: {0}")]
    Delegation(String),

    #[error("plan references unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("invalid state transition {from} -> {to}")]
    InvalidTransition {
        from: OrchestrationState,
        to: OrchestrationState,
    },

    #[error("request cancelled")]
    Cancelled,
}
