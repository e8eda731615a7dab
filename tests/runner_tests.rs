//! End-to-end tests for the turn loop.
//!
//! Every test drives real agents with `ScriptedModel`, so runs are
//! deterministic and each model request can be inspected afterwards.
//!
//! ## Coverage
//! - Transfers: routing, chain order, context isolation
//! - Tools: batching, error isolation, shared context, token budget
//! - Guardrails: fatal input checks, output retry with feedback
//! - Termination: turn limit, loop detection, model errors, abort
//! - Sessions, structured output and observers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_engine::guardrails::{
    FnGuardrail, GuardrailError, GuardrailKind, MaxLengthGuardrail, PiiGuardrail,
};
use agent_engine::model::{GenerateRequest, Model, ModelError, ScriptedModel};
use agent_engine::observability::{Observer, ObserverSpan, RunEvent};
use agent_engine::session::{MemorySession, Session};
use agent_engine::tokens::BUDGET_PLACEHOLDER;
use agent_engine::tools::{FnTool, RunContext};
use agent_engine::types::{Message, ModelResponse, Role, ToolCall, ToolError, Usage};
use agent_engine::{Agent, Error, RunOptions, Runner};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const INPUT: &str = "What's my invoice total?";

fn scripted(responses: impl IntoIterator<Item = ModelResponse>) -> Arc<ScriptedModel> {
    Arc::new(ScriptedModel::new(responses))
}

fn call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall::new(id, name, args)
}

fn transfer(id: &str, target: &str, reason: &str) -> ModelResponse {
    ModelResponse::tool_calls(vec![call(
        id,
        &format!("transfer_to_{}", target),
        json!({ "reason": reason }),
    )])
}

fn lookup_tool() -> FnTool {
    FnTool::new("lookup", "Look up an account", |_args, _ctx| async move {
        Ok(json!({ "balance": 120 }))
    })
}

fn echo_tool() -> FnTool {
    FnTool::new("echo", "Echo the text argument", |args: Value, _ctx| async move {
        Ok(args["text"].clone())
    })
}

// ============================================================================
// 1. Transfers
// ============================================================================

mod transfer_tests {
    use super::*;

    #[tokio::test]
    async fn test_router_hands_off_to_billing() {
        let billing_model = scripted([ModelResponse::text("Your invoice total is $120.")]);
        let router_model = scripted([transfer("c1", "billing", "billing question")]);

        let billing = Arc::new(
            Agent::builder("Billing")
                .instructions("You answer billing questions.")
                .handoff_description("Invoices and payments")
                .model(billing_model.clone())
                .build()
                .unwrap(),
        );
        let router = Arc::new(
            Agent::builder("Router")
                .instructions("Route the user.")
                .model(router_model.clone())
                .subagent(billing)
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&router, INPUT, RunOptions::default())
            .await
            .unwrap();

        assert_eq!(result.final_output.as_deref(), Some("Your invoice total is $120."));
        assert_eq!(result.metadata.handoff_chain, ["Router", "Billing"]);

        let router_request = &router_model.requests()[0];
        assert!(router_request.has_tool("transfer_to_billing"));

        let billing_requests = billing_model.requests();
        assert_eq!(billing_requests.len(), 1);
        assert_eq!(billing_requests[0].messages, vec![Message::user(INPUT)]);
        assert!(
            billing_requests[0]
                .system
                .starts_with("Transferred from Router to Billing because billing question.")
        );
        assert!(billing_requests[0].system.ends_with("You answer billing questions."));

        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[0].agent_name, "Router");
        assert_eq!(result.steps[1].agent_name, "Billing");
        assert_eq!(result.steps[0].tool_calls[0].tool_name, "transfer_to_billing");
    }

    #[tokio::test]
    async fn test_transfer_note_lasts_one_turn() {
        let billing_model = scripted([
            ModelResponse::tool_calls(vec![call("c2", "lookup", json!({}))]),
            ModelResponse::text("Balance is 120."),
        ]);
        let billing = Arc::new(
            Agent::builder("Billing")
                .instructions("Billing specialist.")
                .model(billing_model.clone())
                .tool(lookup_tool())
                .build()
                .unwrap(),
        );
        let router = Arc::new(
            Agent::builder("Router")
                .model(scripted([transfer("c1", "billing", "billing question")]))
                .subagent(billing)
                .build()
                .unwrap(),
        );

        Runner::new()
            .execute(&router, INPUT, RunOptions::default())
            .await
            .unwrap();

        let requests = billing_model.requests();
        assert!(requests[0].system.starts_with("Transferred from Router"));
        assert_eq!(requests[1].system, "Billing specialist.");
    }

    #[tokio::test]
    async fn test_chain_records_each_agent_once() {
        let a_model = scripted([
            transfer("c1", "b", "needs b"),
            ModelResponse::text("done by A"),
        ]);
        let b_model = scripted([transfer("c2", "a", "back to a")]);

        let b = Arc::new(Agent::builder("B").model(b_model).build().unwrap());
        let a = Arc::new(
            Agent::builder("A")
                .model(a_model.clone())
                .subagent(b.clone())
                .build()
                .unwrap(),
        );
        b.set_subagents(vec![a.clone()]).unwrap();

        let result = Runner::new()
            .execute(&a, "hello", RunOptions::default())
            .await
            .unwrap();

        assert_eq!(result.final_output.as_deref(), Some("done by A"));
        assert_eq!(result.metadata.handoff_chain, ["A", "B"]);
        assert_eq!(a_model.requests()[1].messages, vec![Message::user("hello")]);
        assert_eq!(result.metadata.agent_metrics["A"].turns, 2);
        assert_eq!(result.metadata.agent_metrics["B"].turns, 1);
    }

    #[tokio::test]
    async fn test_context_isolation_after_tool_turns() {
        let billing_model = scripted([ModelResponse::text("done")]);
        let billing = Arc::new(
            Agent::builder("Billing")
                .model(billing_model.clone())
                .build()
                .unwrap(),
        );
        let router = Arc::new(
            Agent::builder("Router")
                .model(scripted([
                    ModelResponse::tool_calls(vec![call("c1", "lookup", json!({}))]),
                    ModelResponse::tool_calls(vec![
                        call("c2", "lookup", json!({})),
                        call("c3", "lookup", json!({})),
                    ])
                    .with_text("thinking out loud"),
                    transfer("c4", "billing", "billing question"),
                ]))
                .tool(lookup_tool())
                .subagent(billing)
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&router, INPUT, RunOptions::default())
            .await
            .unwrap();

        assert_eq!(billing_model.requests()[0].messages, vec![Message::user(INPUT)]);
        assert!(
            result
                .messages
                .iter()
                .all(|m| !m.content.contains("thinking out loud"))
        );
    }

    #[tokio::test]
    async fn test_unknown_transfer_target_is_failed_call() {
        let model = scripted([
            transfer("c1", "legal", "contract question"),
            ModelResponse::text("I can't transfer you, sorry."),
        ]);
        let router = Arc::new(
            Agent::builder("Router")
                .model(model.clone())
                .subagent(Arc::new(
                    Agent::builder("Billing")
                        .model(Arc::new(ScriptedModel::default()))
                        .build()
                        .unwrap(),
                ))
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&router, INPUT, RunOptions::default())
            .await
            .unwrap();

        assert_eq!(result.metadata.handoff_chain, ["Router"]);
        let tool_message = model.requests()[1]
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .cloned()
            .unwrap();
        assert!(tool_message.content.contains("No agent matches"));
        assert!(tool_message.content.contains("Billing"));
    }
}

// ============================================================================
// 2. Tool execution
// ============================================================================

mod tool_tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_tool_does_not_block_siblings() {
        let agent = Arc::new(
            Agent::builder("Support")
                .model(scripted([
                    ModelResponse::tool_calls(vec![
                        call("c1", "first", json!({})),
                        call("c2", "broken", json!({})),
                        call("c3", "third", json!({})),
                    ]),
                    ModelResponse::text("done"),
                ]))
                .tool(FnTool::new("first", "", |_a, _c| async move { Ok(json!(1)) }))
                .tool(FnTool::new("broken", "", |_a, _c| async move {
                    Err(ToolError::execution_failed("database unavailable"))
                }))
                .tool(FnTool::new("third", "", |_a, _c| async move { Ok(json!(3)) }))
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&agent, "go", RunOptions::default())
            .await
            .unwrap();

        assert_eq!(result.final_output.as_deref(), Some("done"));
        let calls = &result.steps[0].tool_calls;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].result, Some(json!(1)));
        assert!(calls[1].error.as_deref().unwrap().contains("database unavailable"));
        assert_eq!(calls[2].result, Some(json!(3)));

        let tool_messages: Vec<&Message> =
            result.messages.iter().filter(|m| m.role == Role::Tool).collect();
        let ids: Vec<_> = tool_messages
            .iter()
            .map(|m| m.tool_call_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
        assert!(tool_messages[1].content.starts_with("Error:"));
        assert_eq!(result.metadata.agent_metrics["Support"].errors, 1);
        assert_eq!(result.metadata.total_tool_calls, 3);
    }

    #[tokio::test]
    async fn test_repeated_call_ids_keep_every_result() {
        let model = scripted([
            ModelResponse::tool_calls(vec![
                call("", "echo", json!({ "text": "one" })),
                call("", "echo", json!({ "text": "two" })),
            ]),
            ModelResponse::text("done"),
        ]);
        let agent = Arc::new(
            Agent::builder("Support")
                .model(model.clone())
                .tool(echo_tool())
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&agent, "go", RunOptions::default())
            .await
            .unwrap();

        let calls = &result.steps[0].tool_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].result, Some(json!("one")));
        assert_eq!(calls[1].result, Some(json!("two")));

        let contents: Vec<_> = model.requests()[1]
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(contents, ["one", "two"]);
        assert_eq!(result.metadata.total_tool_calls, 2);
    }

    #[tokio::test]
    async fn test_tools_share_run_context() {
        let context = RunContext::new();
        let agent = Arc::new(
            Agent::builder("Support")
                .model(scripted([
                    ModelResponse::tool_calls(vec![call("c1", "remember", json!({}))]),
                    ModelResponse::text("noted"),
                ]))
                .tool(FnTool::new("remember", "", |_a, ctx| async move {
                    ctx.context.insert("seen_by", json!(ctx.call_id()));
                    Ok(Value::Null)
                }))
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&agent, "go", RunOptions::new().context(context.clone()))
            .await
            .unwrap();

        assert_eq!(context.get("seen_by"), Some(json!("c1")));
        assert!(result.state.unwrap().context.same_as(&context));
    }

    #[tokio::test]
    async fn test_token_budget_is_monotonic() {
        let long = "x".repeat(100);
        let model = scripted([
            ModelResponse::tool_calls(vec![
                call("c1", "echo", json!({ "text": "abc" })),
                call("c2", "echo", json!({ "text": long })),
                call("c3", "echo", json!({ "text": "abc" })),
            ]),
            ModelResponse::tool_calls(vec![call("c4", "echo", json!({ "text": "a" }))]),
            ModelResponse::text("ok"),
        ]);
        let agent = Arc::new(
            Agent::builder("Support")
                .model(model)
                .tool(echo_tool())
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&agent, "go", RunOptions::new().token_budget(10))
            .await
            .unwrap();

        let contents: Vec<&str> = result
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(
            contents,
            ["abc", BUDGET_PLACEHOLDER, BUDGET_PLACEHOLDER, BUDGET_PLACEHOLDER]
        );
        assert!(result.state.unwrap().budget.reached);
    }

    #[tokio::test]
    async fn test_disabled_predicate_tool_runs_when_enabled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let tool = FnTool::new("audit", "", move |_a, _c| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("logged"))
            }
        })
        .enabled_when(|ctx| {
            let trusted = ctx.context.get("trusted") == Some(json!(true));
            async move { trusted }
        });

        let agent = Arc::new(
            Agent::builder("Support")
                .model(scripted([
                    ModelResponse::tool_calls(vec![call("c1", "audit", json!({}))]),
                    ModelResponse::text("done"),
                ]))
                .tool(tool)
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(
                &agent,
                "go",
                RunOptions::new().context_value(json!({ "trusted": true })),
            )
            .await
            .unwrap();

        assert!(!result.is_interrupted());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}

// ============================================================================
// 3. Guardrails
// ============================================================================

mod guardrail_tests {
    use super::*;

    #[tokio::test]
    async fn test_input_guardrail_is_fatal() {
        let model = scripted([ModelResponse::text("never")]);
        let agent = Arc::new(
            Agent::builder("Support")
                .model(model.clone())
                .guardrail(PiiGuardrail::new().for_input())
                .build()
                .unwrap(),
        );

        let err = Runner::new()
            .execute(&agent, "my email is jane@example.com", RunOptions::default())
            .await
            .unwrap_err();

        match &err {
            Error::InputGuardrailTripped {
                agent, guardrail, ..
            } => {
                assert_eq!(agent, "Support");
                assert_eq!(guardrail, "pii");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_fatal());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_erroring_validator_fails_closed() {
        let agent = Arc::new(
            Agent::builder("Support")
                .model(scripted([ModelResponse::text("never")]))
                .guardrail(FnGuardrail::new(
                    "moderation",
                    GuardrailKind::Input,
                    |_content, _ctx| async move {
                        Err(GuardrailError::CheckFailed("moderation backend down".into()))
                    },
                ))
                .build()
                .unwrap(),
        );

        let err = Runner::new()
            .execute(&agent, "hello", RunOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InputGuardrailTripped { .. }));
        assert!(err.to_string().contains("validator error"));
    }

    #[tokio::test]
    async fn test_output_guardrail_feedback_and_retry() {
        let model = scripted([
            ModelResponse::text("This answer is far too long for the limit."),
            ModelResponse::text("Short."),
        ]);
        let agent = Arc::new(
            Agent::builder("Support")
                .model(model.clone())
                .guardrail(MaxLengthGuardrail::new(20))
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&agent, "hello", RunOptions::default())
            .await
            .unwrap();

        assert_eq!(result.final_output.as_deref(), Some("Short."));
        let retry_request = &model.requests()[1];
        let feedback = retry_request.messages.last().unwrap();
        assert_eq!(feedback.role, Role::System);
        assert!(feedback.content.contains("too long"));
        assert_eq!(result.metadata.agent_metrics["Support"].guardrail_retries, 1);
    }

    #[tokio::test]
    async fn test_always_failing_output_guardrail_hits_turn_limit() {
        let model = Arc::new(
            ScriptedModel::new([ModelResponse::text("This will never be short enough.")])
                .repeat_last(),
        );
        let agent = Arc::new(
            Agent::builder("Support")
                .model(model.clone())
                .guardrail(MaxLengthGuardrail::new(5))
                .build()
                .unwrap(),
        );

        let err = Runner::new()
            .execute(&agent, "hello", RunOptions::new().max_turns(3))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MaxTurnsExceeded { max_turns: 3, .. }));
        assert_eq!(model.call_count(), 3);
    }
}

// ============================================================================
// 4. Termination
// ============================================================================

mod termination_tests {
    use super::*;

    struct StalledModel;

    #[async_trait]
    impl Model for StalledModel {
        async fn generate(&self, _request: GenerateRequest) -> Result<ModelResponse, ModelError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_turns_increase_by_one() {
        let agent = Arc::new(
            Agent::builder("Support")
                .model(scripted([
                    ModelResponse::tool_calls(vec![call("c1", "lookup", json!({}))]),
                    ModelResponse::tool_calls(vec![call("c2", "lookup", json!({}))]),
                    ModelResponse::tool_calls(vec![call("c3", "lookup", json!({}))]),
                    ModelResponse::text("done"),
                ]))
                .tool(lookup_tool())
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&agent, "go", RunOptions::default())
            .await
            .unwrap();

        let numbers: Vec<u32> = result.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, [1, 2, 3, 4]);
        let state = result.state.unwrap();
        assert_eq!(state.current_turn, 4);
        assert_eq!(state.steps.len(), 4);
    }

    #[tokio::test]
    async fn test_turn_limit_reports_last_step() {
        let model = Arc::new(
            ScriptedModel::new([ModelResponse::tool_calls(vec![call(
                "c1",
                "lookup",
                json!({}),
            )])])
            .repeat_last(),
        );
        let agent = Arc::new(
            Agent::builder("Support")
                .model(model.clone())
                .tool(lookup_tool())
                .build()
                .unwrap(),
        );

        let err = Runner::new()
            .execute(&agent, "go", RunOptions::new().max_turns(4))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("'Support'"));
        assert!(message.contains("tool calls: [lookup]"));
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn test_loop_detection_forces_finish() {
        let model = Arc::new(ScriptedModel::new([ModelResponse::text("I am done.")]).repeat_last());
        let agent = Arc::new(
            Agent::builder("Support")
                .model(model.clone())
                .should_finish(|_, _| false)
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&agent, "go", RunOptions::default())
            .await
            .unwrap();

        let output = result.final_output.unwrap();
        assert!(output.contains("'Support'"));
        assert!(output.contains("2 consecutive turns"));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_model_error_is_fatal() {
        let model = Arc::new(ScriptedModel::default());
        model.push_error(ModelError::request("connection reset"));
        let agent = Arc::new(Agent::builder("Support").model(model).build().unwrap());

        let err = Runner::new()
            .execute(&agent, "go", RunOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Model { turn: 1, .. }));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_model_call() {
        let agent = Arc::new(
            Agent::builder("Support")
                .model(Arc::new(StalledModel))
                .build()
                .unwrap(),
        );
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = Runner::new()
            .execute(&agent, "go", RunOptions::new().cancellation(token))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Aborted { turn: 1, .. }));
        assert!(err.is_fatal());
    }
}

// ============================================================================
// 5. Sessions, structured output, observers
// ============================================================================

mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_session_history_loaded_and_persisted() {
        let session = Arc::new(MemorySession::with_history(
            "s-1",
            vec![Message::user("earlier"), Message::assistant("hi there")],
        ));
        let model = scripted([ModelResponse::text("answer")]);
        let agent = Arc::new(Agent::builder("Support").model(model.clone()).build().unwrap());

        Runner::new()
            .session(session.clone())
            .execute(&agent, "question", RunOptions::default())
            .await
            .unwrap();

        assert_eq!(model.requests()[0].messages.len(), 3);
        let history = session.history().await.unwrap();
        assert_eq!(
            history,
            vec![
                Message::user("earlier"),
                Message::assistant("hi there"),
                Message::user("question"),
                Message::assistant("answer"),
            ]
        );
    }

    #[tokio::test]
    async fn test_structured_output_extracted() {
        #[derive(Debug, PartialEq, serde::Deserialize, schemars::JsonSchema)]
        struct Invoice {
            total: u32,
        }

        let agent = Arc::new(
            Agent::builder("Billing")
                .model(scripted([ModelResponse::text(
                    "Here you go:\n```json\n{\"total\": 120}\n```",
                )]))
                .output_type::<Invoice>()
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .execute(&agent, INPUT, RunOptions::default())
            .await
            .unwrap();

        assert_eq!(result.extract::<Invoice>(), Some(Invoice { total: 120 }));
    }

    #[tokio::test]
    async fn test_dynamic_instructions_read_context() {
        let model = scripted([ModelResponse::text("ok")]);
        let agent = Arc::new(
            Agent::builder("Support")
                .model(model.clone())
                .dynamic_instructions(|ctx| {
                    format!(
                        "Customer tier: {}",
                        ctx.get_as::<String>("tier").unwrap_or_default()
                    )
                })
                .build()
                .unwrap(),
        );

        Runner::new()
            .execute(
                &agent,
                "hi",
                RunOptions::new().context_value(json!({ "tier": "gold" })),
            )
            .await
            .unwrap();

        assert_eq!(model.requests()[0].system, "Customer tier: gold");
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<&'static str>>,
    }

    impl Observer for Recorder {
        fn on_event(&self, event: &RunEvent) {
            self.events.lock().unwrap().push(event.name());
        }
    }

    struct Panicky;

    impl Observer for Panicky {
        fn on_event(&self, _event: &RunEvent) {
            panic!("observer bug");
        }
    }

    #[tokio::test]
    async fn test_observers_cannot_change_outcome() {
        let recorder = Arc::new(Recorder::default());
        let agent = Arc::new(
            Agent::builder("Support")
                .model(scripted([
                    ModelResponse::tool_calls(vec![call("c1", "lookup", json!({}))]),
                    ModelResponse::text("done"),
                ]))
                .tool(lookup_tool())
                .build()
                .unwrap(),
        );

        let result = Runner::new()
            .observer(Arc::new(Panicky))
            .observer(recorder.clone())
            .execute(&agent, "go", RunOptions::default())
            .await
            .unwrap();

        assert_eq!(result.final_output.as_deref(), Some("done"));
        assert_eq!(
            *recorder.events.lock().unwrap(),
            [
                "run_started",
                "turn_started",
                "tools_executed",
                "turn_started",
                "run_finished"
            ]
        );
    }

    #[derive(Default)]
    struct SpanLog {
        closed: Arc<Mutex<Vec<(String, Value)>>>,
    }

    struct LoggedSpan {
        name: String,
        closed: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl ObserverSpan for LoggedSpan {
        fn end(self: Box<Self>, output: &Value, _usage: Option<&Usage>) {
            self.closed.lock().unwrap().push((self.name, output.clone()));
        }
    }

    impl Observer for SpanLog {
        fn begin(&self, name: &str, _metadata: &Value) -> Option<Box<dyn ObserverSpan>> {
            Some(Box::new(LoggedSpan {
                name: name.to_string(),
                closed: self.closed.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_spans_cover_model_tools_and_guardrails() {
        let log = Arc::new(SpanLog::default());
        let agent = Arc::new(
            Agent::builder("Support")
                .model(scripted([
                    ModelResponse::tool_calls(vec![call("c1", "lookup", json!({}))]),
                    ModelResponse::text("done"),
                ]))
                .tool(lookup_tool())
                .guardrail(MaxLengthGuardrail::new(100))
                .build()
                .unwrap(),
        );

        Runner::new()
            .observer(log.clone())
            .execute(&agent, "go", RunOptions::default())
            .await
            .unwrap();

        let closed = log.closed.lock().unwrap();
        let names: Vec<&str> = closed.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["generation", "tools", "generation", "guardrails.output"]);
        assert_eq!(closed[1].1["results"], 1);
        assert_eq!(closed[3].1["passed"], true);
    }
}
