use std::sync::Arc;

use super::{TRANSFER_PREFIX, is_transfer_call, normalize_agent_name};
use crate::agent::Agent;
use crate::types::{ToolCall, ToolError, ToolExecutionResult};

/// A transfer call that resolved to a sub-agent.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Position of the call in the model response.
    pub index: usize,
    pub call: ToolCall,
    pub target: Arc<Agent>,
    pub reason: Option<String>,
    pub context: Option<String>,
}

/// A turn's tool calls split into ordinary calls, the winning transfer,
/// and transfer calls answered with an error without executing.
///
/// Rejected results carry their position in the model response, so the
/// caller can merge everything back in call order without keying on ids.
#[derive(Debug, Default)]
pub struct TransferDetection {
    pub ordinary: Vec<ToolCall>,
    pub transfer: Option<TransferRequest>,
    pub rejected: Vec<(usize, ToolExecutionResult)>,
}

impl TransferDetection {
    pub fn has_transfer(&self) -> bool {
        self.transfer.is_some()
    }
}

/// Split `calls` against `subagents`.
///
/// Only the first call carrying the transfer prefix is considered. If it
/// names no known sub-agent it fails like any other bad call; further
/// transfer calls in the same turn are refused.
pub fn detect_transfer(calls: &[ToolCall], subagents: &[Arc<Agent>]) -> TransferDetection {
    let mut detection = TransferDetection::default();
    let mut candidate_seen = false;

    for (index, call) in calls.iter().enumerate() {
        if !is_transfer_call(&call.name) {
            detection.ordinary.push(call.clone());
            continue;
        }

        if candidate_seen {
            detection.rejected.push((
                index,
                ToolExecutionResult::failed(
                    call,
                    ToolError::transfer("Only one transfer per turn is allowed; this call was ignored."),
                ),
            ));
            continue;
        }
        candidate_seen = true;

        match resolve_target(&call.name, subagents) {
            Some(target) => {
                detection.transfer = Some(TransferRequest {
                    index,
                    call: call.clone(),
                    target,
                    reason: string_arg(call, "reason"),
                    context: string_arg(call, "context"),
                });
            }
            None => {
                let available = subagents
                    .iter()
                    .map(|a| a.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                tracing::debug!(tool = %call.name, "Transfer target not found");
                detection.rejected.push((
                    index,
                    ToolExecutionResult::failed(
                        call,
                        ToolError::transfer(format!(
                            "No agent matches '{}'. Available agents: [{}]",
                            call.name, available
                        )),
                    ),
                ));
            }
        }
    }

    detection
}

fn resolve_target(tool_name: &str, subagents: &[Arc<Agent>]) -> Option<Arc<Agent>> {
    let wanted = normalize_agent_name(tool_name.get(TRANSFER_PREFIX.len()..)?);
    subagents
        .iter()
        .find(|agent| normalize_agent_name(agent.name()) == wanted)
        .cloned()
}

fn string_arg(call: &ToolCall, key: &str) -> Option<String> {
    call.args
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
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

    #[test]
    fn test_resolves_normalized_names() {
        let subagents = vec![agent("Billing Team"), agent("Support")];
        let calls = vec![
            ToolCall::new("c1", "lookup", json!({})),
            ToolCall::new("c2", "transfer_to_billing_team", json!({"reason": "invoice", "context": " vip "})),
        ];

        let detection = detect_transfer(&calls, &subagents);
        let transfer = detection.transfer.expect("transfer");
        assert_eq!(transfer.target.name(), "Billing Team");
        assert_eq!(transfer.index, 1);
        assert_eq!(transfer.reason.as_deref(), Some("invoice"));
        assert_eq!(transfer.context.as_deref(), Some("vip"));
        assert_eq!(detection.ordinary.len(), 1);
        assert!(detection.rejected.is_empty());
    }

    #[test]
    fn test_first_transfer_wins() {
        let subagents = vec![agent("Billing"), agent("Support")];
        let calls = vec![
            ToolCall::new("c1", "transfer_to_support", json!({"reason": "help"})),
            ToolCall::new("c2", "transfer_to_billing", json!({"reason": "money"})),
        ];

        let detection = detect_transfer(&calls, &subagents);
        let transfer = detection.transfer.unwrap();
        assert_eq!(transfer.target.name(), "Support");
        assert_eq!(transfer.index, 0);
        assert_eq!(detection.rejected.len(), 1);
        assert_eq!(detection.rejected[0].0, 1);
        assert_eq!(detection.rejected[0].1.call_id, "c2");
    }

    #[test]
    fn test_unknown_target_is_failed_call() {
        let subagents = vec![agent("Billing")];
        let calls = vec![ToolCall::new("c1", "transfer_to_legal", json!({}))];

        let detection = detect_transfer(&calls, &subagents);
        assert!(!detection.has_transfer());
        assert_eq!(detection.rejected.len(), 1);
        let error = detection.rejected[0].1.error.as_deref().unwrap();
        assert!(error.contains("transfer_to_legal"));
        assert!(error.contains("Billing"));
    }
}
