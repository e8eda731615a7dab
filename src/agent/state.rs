//! Run state management.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApprovalDecision;
use super::definition::Agent;
use super::metrics::AgentMetrics;
use crate::handoff::{HandoffChain, TransferNote};
use crate::tokens::{ResultBudget, UsageCounter};
use crate::tools::RunContext;
use crate::types::{FinishReason, Message, ToolCall, ToolExecutionResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepToolCall {
    pub tool_name: String,
    pub args: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ToolExecutionResult> for StepToolCall {
    fn from(result: &ToolExecutionResult) -> Self {
        Self {
            tool_name: result.tool_name.clone(),
            args: result.args.clone(),
            result: result.result.clone(),
            error: result.error.clone(),
        }
    }
}

/// Audit record for one completed turn. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_number: u32,
    pub agent_name: String,
    pub tool_calls: Vec<StepToolCall>,
    pub text: String,
    pub finish_reason: FinishReason,
    pub timestamp: DateTime<Utc>,
}

impl StepResult {
    /// One-line description used in diagnostics.
    pub fn summary(&self) -> String {
        let text = if self.text.trim().is_empty() {
            "<no text>".to_string()
        } else {
            truncate(self.text.trim(), 160)
        };
        if self.tool_calls.is_empty() {
            return format!("text: {} (finish: {})", text, self.finish_reason);
        }
        let tools = self
            .tool_calls
            .iter()
            .map(|c| c.tool_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "text: {}; tool calls: [{}] (finish: {})",
            text, tools, self.finish_reason
        )
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionKind {
    #[default]
    ToolApproval,
}

/// A gated tool call waiting for a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interruption {
    pub call_id: String,
    pub tool_name: String,
    pub args: Value,
    #[serde(rename = "type", default)]
    pub kind: InterruptionKind,
    pub agent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ApprovalDecision>,
}

impl Interruption {
    pub fn from_pending(result: &ToolExecutionResult, agent_name: &str) -> Self {
        Self {
            call_id: result.call_id.clone(),
            tool_name: result.tool_name.clone(),
            args: result.args.clone(),
            kind: InterruptionKind::ToolApproval,
            agent_name: agent_name.to_string(),
            decision: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.decision.is_some()
    }

    /// The call as it will execute, with any modified arguments applied.
    pub fn to_call(&self) -> ToolCall {
        ToolCall::new(&self.call_id, &self.tool_name, self.args.clone())
    }
}

/// The full mutable record of one execution.
///
/// Owned and written only by the runner. Returned to the caller while
/// interruptions are pending so the same state can be resumed.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: String,
    pub(crate) current_agent: Arc<Agent>,
    pub original_input: String,
    pub messages: Vec<Message>,
    pub context: RunContext,
    pub current_turn: u32,
    pub max_turns: u32,
    pub steps: Vec<StepResult>,
    pub agent_metrics: BTreeMap<String, AgentMetrics>,
    pub handoff_chain: HandoffChain,
    pub pending_interruptions: Vec<Interruption>,
    pub usage: UsageCounter,
    pub budget: ResultBudget,
    pub(crate) pending_transfer: Option<TransferNote>,
    pub(crate) idle_text_turns: u32,
    pub(crate) history_len: usize,
    pub(crate) transferred: bool,
}

impl RunState {
    pub fn new(
        agent: Arc<Agent>,
        input: impl Into<String>,
        context: RunContext,
        max_turns: u32,
        token_budget: Option<u64>,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            handoff_chain: HandoffChain::new(agent.name()),
            current_agent: agent,
            original_input: input.into(),
            messages: Vec::new(),
            context,
            current_turn: 0,
            max_turns,
            steps: Vec::new(),
            agent_metrics: BTreeMap::new(),
            pending_interruptions: Vec::new(),
            usage: UsageCounter::new(),
            budget: ResultBudget::new(token_budget),
            pending_transfer: None,
            idle_text_turns: 0,
            history_len: 0,
            transferred: false,
        }
    }

    pub fn current_agent(&self) -> &Arc<Agent> {
        &self.current_agent
    }

    pub fn is_interrupted(&self) -> bool {
        self.pending_interruptions.iter().any(|i| !i.is_resolved())
    }

    pub fn unresolved_interruptions(&self) -> impl Iterator<Item = &Interruption> {
        self.pending_interruptions.iter().filter(|i| !i.is_resolved())
    }

    pub fn last_step(&self) -> Option<&StepResult> {
        self.steps.last()
    }

    pub fn pending_transfer(&self) -> Option<&TransferNote> {
        self.pending_transfer.as_ref()
    }

    pub(crate) fn metrics_mut(&mut self, agent: &str) -> &mut AgentMetrics {
        self.agent_metrics.entry(agent.to_string()).or_default()
    }

    /// Messages this run added on top of the loaded session history.
    pub(crate) fn produced_messages(&self) -> &[Message] {
        if self.transferred {
            &self.messages
        } else {
            &self.messages[self.history_len.min(self.messages.len())..]
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id.clone(),
            current_agent: self.current_agent.name().to_string(),
            original_input: self.original_input.clone(),
            messages: self.messages.clone(),
            context: self.context.to_map(),
            current_turn: self.current_turn,
            max_turns: self.max_turns,
            steps: self.steps.clone(),
            agent_metrics: self.agent_metrics.clone(),
            handoff_chain: self.handoff_chain.clone(),
            pending_interruptions: self.pending_interruptions.clone(),
            usage: self.usage,
            budget: self.budget,
            pending_transfer: self.pending_transfer.clone(),
            idle_text_turns: self.idle_text_turns,
            history_len: self.history_len,
            transferred: self.transferred,
        }
    }

    /// Rebuild a state from `snapshot`, finding its active agent in the
    /// graph reachable from `root`.
    pub fn restore(root: &Arc<Agent>, snapshot: RunSnapshot) -> crate::Result<Self> {
        let current_agent = root
            .find(&snapshot.current_agent)
            .ok_or_else(|| crate::Error::UnknownAgent {
                name: snapshot.current_agent.clone(),
                root: root.name().to_string(),
            })?;

        Ok(Self {
            run_id: snapshot.run_id,
            current_agent,
            original_input: snapshot.original_input,
            messages: snapshot.messages,
            context: RunContext::from_value(Value::Object(snapshot.context)),
            current_turn: snapshot.current_turn,
            max_turns: snapshot.max_turns,
            steps: snapshot.steps,
            agent_metrics: snapshot.agent_metrics,
            handoff_chain: snapshot.handoff_chain,
            pending_interruptions: snapshot.pending_interruptions,
            usage: snapshot.usage,
            budget: snapshot.budget,
            pending_transfer: snapshot.pending_transfer,
            idle_text_turns: snapshot.idle_text_turns,
            history_len: snapshot.history_len,
            transferred: snapshot.transferred,
        })
    }
}

/// Serializable form of [`RunState`] for suspending a run across
/// processes. The active agent is stored by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: String,
    pub current_agent: String,
    pub original_input: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub context: serde_json::Map<String, Value>,
    pub current_turn: u32,
    pub max_turns: u32,
    pub steps: Vec<StepResult>,
    #[serde(default)]
    pub agent_metrics: BTreeMap<String, AgentMetrics>,
    pub handoff_chain: HandoffChain,
    #[serde(default)]
    pub pending_interruptions: Vec<Interruption>,
    #[serde(default)]
    pub usage: UsageCounter,
    #[serde(default)]
    pub budget: ResultBudget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_transfer: Option<TransferNote>,
    #[serde(default)]
    pub idle_text_turns: u32,
    #[serde(default)]
    pub history_len: usize,
    #[serde(default)]
    pub transferred: bool,
}

impl RunSnapshot {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedModel;
    use serde_json::json;

    fn agent(name: &str) -> Arc<Agent> {
        Arc::new(
            Agent::builder(name)
                .model(Arc::new(ScriptedModel::default()))
                .build()
                .unwrap(),
        )
    }

    fn step(text: &str, tools: &[&str]) -> StepResult {
        StepResult {
            step_number: 1,
            agent_name: "a".into(),
            tool_calls: tools
                .iter()
                .map(|t| StepToolCall {
                    tool_name: t.to_string(),
                    args: json!({}),
                    result: None,
                    error: None,
                })
                .collect(),
            text: text.into(),
            finish_reason: FinishReason::Stop,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_step_summary() {
        assert_eq!(step("", &[]).summary(), "text: <no text> (finish: stop)");
        assert_eq!(
            step("checking", &["lookup", "search"]).summary(),
            "text: checking; tool calls: [lookup, search] (finish: stop)"
        );
        let long = "x".repeat(200);
        assert!(step(&long, &[]).summary().contains("..."));
    }

    #[test]
    fn test_new_state() {
        let state = RunState::new(agent("Router"), "hi", RunContext::new(), 50, Some(100));
        assert_eq!(state.handoff_chain.as_slice(), ["Router"]);
        assert_eq!(state.current_turn, 0);
        assert!(state.budget.is_active());
        assert!(!state.is_interrupted());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let root = agent("Router");
        let billing = agent("Billing");
        root.set_subagents(vec![billing]).unwrap();

        let mut state = RunState::new(root.clone(), "invoice?", RunContext::new(), 10, None);
        state.context.insert("customer", json!("c-1"));
        state.current_agent = root.find("Billing").unwrap();
        state.handoff_chain.record("Billing");
        state.messages.push(Message::user("invoice?"));
        state.pending_interruptions.push(Interruption {
            call_id: "c1".into(),
            tool_name: "refund".into(),
            args: json!({"amount": 5}),
            kind: InterruptionKind::ToolApproval,
            agent_name: "Billing".into(),
            decision: None,
        });

        let json = state.snapshot().to_json().unwrap();
        assert!(json.contains(r#""type":"tool_approval""#));

        let restored = RunState::restore(&root, RunSnapshot::from_json(&json).unwrap()).unwrap();
        assert_eq!(restored.current_agent().name(), "Billing");
        assert_eq!(restored.context.get("customer"), Some(json!("c-1")));
        assert!(restored.is_interrupted());
        assert_eq!(restored.snapshot(), state.snapshot());
    }

    #[test]
    fn test_restore_unknown_agent() {
        let root = agent("Router");
        let mut snapshot = RunState::new(root.clone(), "x", RunContext::new(), 10, None).snapshot();
        snapshot.current_agent = "Ghost".into();
        let err = RunState::restore(&root, snapshot).unwrap_err();
        assert!(err.to_string().contains("Ghost"));
    }
}
