//! Turn transition logic.

use std::sync::Arc;

use super::definition::Agent;
use super::state::Interruption;
use crate::handoff::TransferRequest;
use crate::tools::RunContext;
use crate::types::{ModelResponse, ToolExecutionResult};

/// What the runner does after a turn. Exactly one per turn.
#[derive(Debug, Clone)]
pub enum NextStep {
    RunAgain,
    Handoff {
        new_agent: Arc<Agent>,
        reason: Option<String>,
        context: Option<String>,
    },
    FinalOutput {
        output: String,
    },
    Interruption {
        interruptions: Vec<Interruption>,
    },
}

impl NextStep {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalOutput { .. } | Self::Interruption { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RunAgain => "run_again",
            Self::Handoff { .. } => "handoff",
            Self::FinalOutput { .. } => "final_output",
            Self::Interruption { .. } => "interruption",
        }
    }
}

/// Decide the transition for a finished turn.
///
/// Priority: pending approvals, then a resolved transfer, then the agent's
/// own `should_finish`, then natural completion of a tool-free text reply.
/// Agents with a `should_finish` never finish through the natural rule.
pub fn determine_next_step(
    agent: &Agent,
    context: &RunContext,
    response: &ModelResponse,
    results: &[ToolExecutionResult],
    transfer: Option<&TransferRequest>,
) -> NextStep {
    let pending: Vec<Interruption> = results
        .iter()
        .filter(|r| r.is_pending_approval())
        .map(|r| Interruption::from_pending(r, agent.name()))
        .collect();
    if !pending.is_empty() {
        return NextStep::Interruption {
            interruptions: pending,
        };
    }

    if let Some(request) = transfer {
        return NextStep::Handoff {
            new_agent: request.target.clone(),
            reason: request.reason.clone(),
            context: request.context.clone(),
        };
    }

    if let Some(should_finish) = agent.should_finish() {
        if should_finish(context, results) && response.has_text() {
            return NextStep::FinalOutput {
                output: response.text.clone(),
            };
        }
        return NextStep::RunAgain;
    }

    if response.tool_calls.is_empty()
        && response.has_text()
        && response.finish_reason.is_natural_completion()
    {
        return NextStep::FinalOutput {
            output: response.text.clone(),
        };
    }

    NextStep::RunAgain
}

/// A turn where a `should_finish` agent answered in text, called no
/// tools, and was still told to keep going.
pub(crate) fn is_idle_text_turn(agent: &Agent, response: &ModelResponse, next: &NextStep) -> bool {
    agent.should_finish().is_some()
        && matches!(next, NextStep::RunAgain)
        && response.tool_calls.is_empty()
        && response.has_text()
}

pub(crate) fn loop_detected_output(agent: &str, turns: u32) -> String {
    format!(
        "Stopped: agent '{}' replied with text and no tool calls for {} consecutive turns \
         while its should_finish check kept returning false. Make should_finish accept a \
         text answer, or instruct the agent to call the tools it is expected to use.",
        agent, turns
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedModel;
    use crate::types::{FinishReason, ToolCall, ToolError};
    use serde_json::json;

    fn agent() -> Agent {
        Agent::builder("Support")
            .model(Arc::new(ScriptedModel::default()))
            .build()
            .unwrap()
    }

    fn finishing_agent(finish: bool) -> Agent {
        Agent::builder("Support")
            .model(Arc::new(ScriptedModel::default()))
            .should_finish(move |_, _| finish)
            .build()
            .unwrap()
    }

    fn call(name: &str) -> ToolCall {
        ToolCall::new("c1", name, json!({}))
    }

    #[test]
    fn test_text_reply_finishes() {
        let next = determine_next_step(
            &agent(),
            &RunContext::new(),
            &ModelResponse::text("done"),
            &[],
            None,
        );
        assert!(matches!(next, NextStep::FinalOutput { output } if output == "done"));
    }

    #[test]
    fn test_truncated_text_still_finishes() {
        let response = ModelResponse::text("partial").with_finish_reason(FinishReason::Length);
        let next = determine_next_step(&agent(), &RunContext::new(), &response, &[], None);
        assert!(matches!(next, NextStep::FinalOutput { .. }));

        let filtered = ModelResponse::text("x").with_finish_reason(FinishReason::ContentFilter);
        let next = determine_next_step(&agent(), &RunContext::new(), &filtered, &[], None);
        assert!(matches!(next, NextStep::RunAgain));
    }

    #[test]
    fn test_tool_turn_runs_again() {
        let response = ModelResponse::tool_calls(vec![call("lookup")]).with_text("checking");
        let results = vec![ToolExecutionResult::from_result(
            &call("lookup"),
            Ok(json!(1)),
            1,
        )];
        let next = determine_next_step(&agent(), &RunContext::new(), &response, &results, None);
        assert!(matches!(next, NextStep::RunAgain));
    }

    #[test]
    fn test_pending_approval_wins() {
        let response = ModelResponse::tool_calls(vec![call("refund")]);
        let results = vec![ToolExecutionResult::pending_approval(&call("refund"))];
        let next = determine_next_step(
            &finishing_agent(true),
            &RunContext::new(),
            &response.with_text("ok"),
            &results,
            None,
        );
        match next {
            NextStep::Interruption { interruptions } => {
                assert_eq!(interruptions.len(), 1);
                assert_eq!(interruptions[0].tool_name, "refund");
                assert_eq!(interruptions[0].agent_name, "Support");
            }
            other => panic!("unexpected {:?}", other.name()),
        }
    }

    #[test]
    fn test_should_finish_is_authoritative() {
        let ctx = RunContext::new();
        let text = ModelResponse::text("answer");

        let next = determine_next_step(&finishing_agent(true), &ctx, &text, &[], None);
        assert!(matches!(next, NextStep::FinalOutput { .. }));

        let next = determine_next_step(&finishing_agent(false), &ctx, &text, &[], None);
        assert!(matches!(next, NextStep::RunAgain));
        assert!(is_idle_text_turn(&finishing_agent(false), &text, &next));

        // Finishing needs generated text.
        let empty = ModelResponse::text("");
        let next = determine_next_step(&finishing_agent(true), &ctx, &empty, &[], None);
        assert!(matches!(next, NextStep::RunAgain));
    }

    #[test]
    fn test_failed_tool_not_idle() {
        let failing = finishing_agent(false);
        let response = ModelResponse::tool_calls(vec![call("lookup")]).with_text("hm");
        let results = vec![ToolExecutionResult::failed(
            &call("lookup"),
            ToolError::execution_failed("boom"),
        )];
        let next = determine_next_step(&failing, &RunContext::new(), &response, &results, None);
        assert!(!is_idle_text_turn(&failing, &response, &next));
    }

    #[test]
    fn test_loop_message_names_agent() {
        let message = loop_detected_output("Support", 2);
        assert!(message.contains("'Support'"));
        assert!(message.contains("2 consecutive turns"));
    }
}
