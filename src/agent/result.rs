//! Caller-facing run outcome.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::metrics::AgentMetrics;
use super::state::{Interruption, RunState, StepResult};
use crate::types::{FinishReason, Message};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub finish_reason: Option<FinishReason>,
    pub total_tool_calls: u64,
    pub handoff_chain: Vec<String>,
    pub agent_metrics: BTreeMap<String, AgentMetrics>,
}

impl RunMetadata {
    pub(crate) fn from_state(state: &RunState) -> Self {
        Self {
            total_tokens: state.usage.total_tokens,
            prompt_tokens: state.usage.input_tokens,
            completion_tokens: state.usage.output_tokens,
            finish_reason: state.last_step().map(|s| s.finish_reason.clone()),
            total_tool_calls: state.agent_metrics.values().map(|m| m.tool_calls as u64).sum(),
            handoff_chain: state.handoff_chain.as_slice().to_vec(),
            agent_metrics: state.agent_metrics.clone(),
        }
    }
}

/// Result of [`Runner::execute`](super::Runner::execute) or
/// [`Runner::resume`](super::Runner::resume).
///
/// `final_output` is `None` while the run waits on approvals; `state`
/// then carries everything needed to resume.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub final_output: Option<String>,
    pub messages: Vec<Message>,
    pub steps: Vec<StepResult>,
    pub state: Option<Box<RunState>>,
    pub metadata: RunMetadata,
    pub structured_output: Option<Value>,
}

impl RunResult {
    pub(crate) fn completed(state: RunState, output: String, structured: Option<Value>) -> Self {
        Self {
            final_output: Some(output),
            messages: state.messages.clone(),
            steps: state.steps.clone(),
            metadata: RunMetadata::from_state(&state),
            structured_output: structured,
            state: Some(Box::new(state)),
        }
    }

    pub(crate) fn interrupted(state: RunState) -> Self {
        Self {
            final_output: None,
            messages: state.messages.clone(),
            steps: state.steps.clone(),
            metadata: RunMetadata::from_state(&state),
            structured_output: None,
            state: Some(Box::new(state)),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.final_output.is_none() && self.state.as_ref().is_some_and(|s| s.is_interrupted())
    }

    /// Approvals the caller must decide on before resuming.
    pub fn interruptions(&self) -> Vec<&Interruption> {
        self.state
            .as_deref()
            .map(|s| s.unresolved_interruptions().collect())
            .unwrap_or_default()
    }

    pub fn text(&self) -> &str {
        self.final_output.as_deref().unwrap_or_default()
    }

    /// Deserialize the structured payload, if the agent declared an output
    /// schema and one was found.
    pub fn extract<T: DeserializeOwned>(&self) -> Option<T> {
        self.structured_output
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn into_state(self) -> Option<RunState> {
        self.state.map(|s| *s)
    }
}
