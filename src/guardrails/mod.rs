//! Input and output validation.
//!
//! Input guardrails run once before the first turn; any failure aborts the
//! run. Output guardrails run whenever the loop is about to finish; a
//! failure becomes corrective feedback and the agent gets another turn.
//! A guardrail that errors or panics counts as failed.

mod builtin;
mod feedback;
mod pipeline;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use builtin::{
    BlocklistGuardrail, FnGuardrail, JsonFormatGuardrail, MaxLengthGuardrail, PiiGuardrail,
};
pub use feedback::{feedback_for, feedback_message};
pub use pipeline::{GuardrailCheck, GuardrailReport, run_guardrails};

use crate::tools::ExecutionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardrailKind {
    Input,
    Output,
}

impl fmt::Display for GuardrailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Why a check failed; selects the feedback template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    TooLong,
    ContainsPii,
    InvalidFormat,
    Blocked,
    Other,
}

impl FailureCategory {
    /// Best-effort guess from a guardrail's name and failure message.
    pub fn infer(name: &str, message: &str) -> Self {
        let haystack = format!("{} {}", name, message).to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

        if has(&["length", "too long", "max_len", "exceeds"]) {
            Self::TooLong
        } else if has(&["pii", "personal", "email", "phone", "ssn", "credit card"]) {
            Self::ContainsPii
        } else if has(&["format", "json", "schema", "parse"]) {
            Self::InvalidFormat
        } else if has(&["block", "forbidden", "prohibited", "not allowed"]) {
            Self::Blocked
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailOutcome {
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FailureCategory>,
}

impl GuardrailOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: None,
            category: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
            category: None,
        }
    }

    pub fn with_category(mut self, category: FailureCategory) -> Self {
        self.category = Some(category);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GuardrailError {
    #[error("Guardrail check failed: {0}")]
    CheckFailed(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[async_trait]
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> GuardrailKind;

    async fn validate(
        &self,
        content: &str,
        context: &ExecutionContext,
    ) -> Result<GuardrailOutcome, GuardrailError>;
}
