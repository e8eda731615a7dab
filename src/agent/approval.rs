//! Human decisions on gated tool calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decision for one pending interruption, supplied on resume in the same
/// order as `RunState::pending_interruptions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approve: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Replaces the call's arguments before it executes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_args: Option<Value>,
}

impl ApprovalDecision {
    pub fn approve() -> Self {
        Self {
            approve: true,
            reason: None,
            modified_args: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approve: false,
            reason: Some(reason.into()),
            modified_args: None,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.modified_args = Some(args);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
