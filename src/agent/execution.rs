//! Turn loop, transitions and resume.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::approval::ApprovalDecision;
use super::definition::Agent;
use super::executor::Runner;
use super::next_step::{NextStep, determine_next_step, is_idle_text_turn, loop_detected_output};
use super::options::RunOptions;
use super::result::RunResult;
use super::state::{RunState, StepResult, StepToolCall};
use crate::guardrails::{GuardrailKind, GuardrailReport, feedback_message, run_guardrails};
use crate::handoff::{TransferNote, TransferRequest, detect_transfer};
use crate::model::GenerateRequest;
use crate::observability::RunEvent;
use crate::output::extract_structured;
use crate::tools::ExecutionContext;
use crate::types::{
    Message, ModelResponse, ToolError, ToolExecutionResult, last_user_message,
};

enum TurnOutcome {
    Continue,
    Finished { output: String, forced: bool },
    Interrupted,
}

impl Runner {
    /// Run `agent` on `input` until it produces a final output, needs
    /// approval, or fails.
    #[instrument(skip_all, fields(agent = %agent.name()))]
    pub async fn execute(
        &self,
        agent: &Arc<Agent>,
        input: impl Into<String>,
        options: RunOptions,
    ) -> crate::Result<RunResult> {
        let input = input.into();
        let mut state = RunState::new(
            agent.clone(),
            input.clone(),
            options.context.clone().unwrap_or_default(),
            options.max_turns.unwrap_or(self.config.max_turns),
            options.token_budget.or(self.config.token_budget),
        );

        if let Some(session) = &self.session {
            let history = session.history().await?;
            debug!(session = session.id(), messages = history.len(), "Loaded session history");
            state.history_len = history.len();
            state.messages = history;
        }
        state.messages.push(Message::user(input));

        info!(run_id = %state.run_id, max_turns = state.max_turns, "Starting run");
        self.observers.emit(&RunEvent::RunStarted {
            run_id: state.run_id.clone(),
            agent: agent.name().to_string(),
        });

        if let Err(err) = self.check_input(&state).await {
            return Err(self.fail(&state, err));
        }

        self.run_loop(state, &options).await
    }

    /// Apply one decision per unresolved interruption, in order, run the
    /// approved calls and continue the same run.
    #[instrument(skip_all, fields(run_id = %state.run_id))]
    pub async fn resume(
        &self,
        mut state: RunState,
        decisions: Vec<ApprovalDecision>,
        options: RunOptions,
    ) -> crate::Result<RunResult> {
        let unresolved: Vec<usize> = state
            .pending_interruptions
            .iter()
            .enumerate()
            .filter(|(_, i)| !i.is_resolved())
            .map(|(index, _)| index)
            .collect();

        if unresolved.is_empty() {
            return Err(crate::Error::InvalidResume(
                "the run has no pending interruptions".into(),
            ));
        }
        if decisions.len() != unresolved.len() {
            return Err(crate::Error::InvalidResume(format!(
                "expected {} decision(s), one per pending interruption, got {}",
                unresolved.len(),
                decisions.len()
            )));
        }
        if let Some(max_turns) = options.max_turns {
            state.max_turns = max_turns;
        }

        let agent = state.current_agent.clone();
        info!(agent = agent.name(), decisions = decisions.len(), "Resuming run");
        self.observers.emit(&RunEvent::RunResumed {
            run_id: state.run_id.clone(),
            agent: agent.name().to_string(),
            decisions: decisions.len(),
        });

        let mut slots: Vec<Option<ToolExecutionResult>> = Vec::with_capacity(unresolved.len());
        let mut approved = Vec::new();
        let mut approved_slots = Vec::new();
        let mut all_approved = true;

        for (index, decision) in unresolved.into_iter().zip(decisions) {
            let record = &mut state.pending_interruptions[index];
            if let Some(args) = &decision.modified_args {
                record.args = args.clone();
            }
            let call = record.to_call();

            if decision.approve {
                approved_slots.push(slots.len());
                slots.push(None);
                approved.push(call);
            } else {
                all_approved = false;
                debug!(tool = %call.name, call_id = %call.id, "Tool call rejected");
                let declined = ToolExecutionResult::failed(
                    &call,
                    ToolError::rejected(decision.reason.clone()),
                )
                .with_approval(false);
                slots.push(Some(declined));
            }
            record.decision = Some(decision);
        }

        let ctx = ExecutionContext::new(state.context.clone(), agent.name(), state.current_turn)
            .with_messages(state.messages.clone());
        if !approved.is_empty() {
            let span = self.observers.begin(
                "tools",
                json!({ "agent": agent.name(), "turn": state.current_turn, "calls": approved.len() }),
            );
            let executed = self
                .tools
                .execute_approved(agent.tools(), &approved, &ctx)
                .await;
            span.end(batch_summary(&executed), None);
            for (slot, result) in approved_slots.into_iter().zip(executed) {
                slots[slot] = Some(result);
            }
        }

        let results: Vec<ToolExecutionResult> = slots.into_iter().flatten().collect();
        state.metrics_mut(agent.name()).record_results(&results);
        self.observers.emit(&RunEvent::ToolsExecuted {
            agent: agent.name().to_string(),
            turn: state.current_turn,
            calls: results.len(),
            errors: results.iter().filter(|r| r.is_error()).count(),
            pending: 0,
        });
        append_tool_messages(&mut state, &agent, &results);

        if all_approved {
            state.pending_interruptions.clear();
        }

        self.run_loop(state, &options).await
    }

    async fn run_loop(&self, mut state: RunState, options: &RunOptions) -> crate::Result<RunResult> {
        loop {
            match self.run_turn(&mut state, options).await {
                Ok(TurnOutcome::Continue) => {}
                Ok(TurnOutcome::Finished { output, forced }) => {
                    return self.finish(state, output, forced).await;
                }
                Ok(TurnOutcome::Interrupted) => return Ok(RunResult::interrupted(state)),
                Err(err) => return Err(self.fail(&state, err)),
            }
        }
    }

    async fn run_turn(&self, state: &mut RunState, options: &RunOptions) -> crate::Result<TurnOutcome> {
        let agent = state.current_agent.clone();

        if state.current_turn >= state.max_turns {
            return Err(crate::Error::MaxTurnsExceeded {
                agent: agent.name().to_string(),
                max_turns: state.max_turns,
                last_step: state
                    .last_step()
                    .map(StepResult::summary)
                    .unwrap_or_else(|| "no step completed".to_string()),
            });
        }

        state.current_turn += 1;
        let turn = state.current_turn;
        let turn_start = Instant::now();
        debug!(turn, agent = agent.name(), "Starting turn");
        self.observers.emit(&RunEvent::TurnStarted {
            run_id: state.run_id.clone(),
            agent: agent.name().to_string(),
            turn,
        });

        let mut system = agent.instructions(&state.context).into_owned();
        if let Some(note) = state.pending_transfer.take() {
            system = note.prepend_to(&system);
        }

        let ctx = ExecutionContext::new(state.context.clone(), agent.name(), turn)
            .with_messages(state.messages.clone());
        let enabled = agent.tools().resolve_enablement(&ctx).await;
        let mut definitions = agent.tools().definitions(&enabled);
        definitions.extend(agent.transfer_definitions());

        let request = GenerateRequest::new(system, state.messages.clone())
            .with_tools(definitions)
            .with_settings(agent.settings().merged(&options.settings));

        let span = self.observers.begin(
            "generation",
            json!({
                "agent": agent.name(),
                "model": agent.model().name(),
                "turn": turn,
                "messages": request.messages.len(),
                "tools": request.tools.len(),
            }),
        );
        let api_start = Instant::now();
        let response = match self.generate(&agent, request, options.cancellation.as_ref(), turn).await {
            Ok(response) => response,
            Err(err) => {
                span.end(json!({ "error": err.to_string() }), None);
                return Err(err);
            }
        };
        let api_ms = api_start.elapsed().as_millis() as u64;
        span.end(
            json!({
                "text": response.text,
                "tool_calls": response.tool_calls.len(),
                "finish_reason": response.finish_reason,
            }),
            Some(&response.usage),
        );
        debug!(
            turn,
            api_time_ms = api_ms,
            tool_calls = response.tool_calls.len(),
            finish_reason = %response.finish_reason,
            "Model call completed"
        );

        state.usage.add(&response.usage);
        let metrics = state.metrics_mut(agent.name());
        metrics.add_usage(&response.usage);
        metrics.record_api_call(api_ms);

        state.messages.push(if response.tool_calls.is_empty() {
            Message::assistant(&response.text)
        } else {
            Message::assistant_with_tools(&response.text, response.tool_calls.clone())
        });

        let subagents = agent.subagents();
        let detection = detect_transfer(&response.tool_calls, &subagents);

        let tool_ctx = ExecutionContext::new(state.context.clone(), agent.name(), turn)
            .with_messages(state.messages.clone());
        let executed = if detection.ordinary.is_empty() {
            Vec::new()
        } else {
            let span = self.observers.begin(
                "tools",
                json!({ "agent": agent.name(), "turn": turn, "calls": detection.ordinary.len() }),
            );
            let executed = self
                .tools
                .execute(agent.tools(), &detection.ordinary, &enabled, &tool_ctx)
                .await;
            span.end(batch_summary(&executed), None);
            executed
        };

        let transfer = detection.transfer;
        let mut results = merge_in_call_order(
            response.tool_calls.len(),
            executed,
            detection.rejected,
            transfer.as_ref().map(|t| t.index),
        );
        let next = determine_next_step(&agent, &state.context, &response, &results, transfer.as_ref());

        if let Some(request) = &transfer {
            let at = request.index.min(results.len());
            results.insert(at, transfer_result(request, &next));
        }

        if !results.is_empty() {
            let pending = results.iter().filter(|r| r.is_pending_approval()).count();
            let errors = results.iter().filter(|r| r.is_error()).count();
            debug!(turn, calls = results.len(), errors, pending, "Tool calls processed");
            self.observers.emit(&RunEvent::ToolsExecuted {
                agent: agent.name().to_string(),
                turn,
                calls: results.len(),
                errors,
                pending,
            });
        }

        let metrics = state.metrics_mut(agent.name());
        metrics.record_results(&results);
        metrics.record_turn(turn_start.elapsed().as_millis() as u64);

        state.steps.push(StepResult {
            step_number: turn,
            agent_name: agent.name().to_string(),
            tool_calls: results.iter().map(StepToolCall::from).collect(),
            text: response.text.clone(),
            finish_reason: response.finish_reason.clone(),
            timestamp: Utc::now(),
        });

        if !matches!(next, NextStep::Handoff { .. }) {
            let answered: Vec<ToolExecutionResult> = results
                .into_iter()
                .filter(|r| !r.is_pending_approval())
                .collect();
            append_tool_messages(state, &agent, &answered);
        }

        if is_idle_text_turn(&agent, &response, &next) {
            state.idle_text_turns += 1;
            if state.idle_text_turns >= self.config.loop_detection_threshold {
                warn!(
                    agent = agent.name(),
                    turn,
                    consecutive = state.idle_text_turns,
                    "Loop detected, forcing final output"
                );
                self.observers.emit(&RunEvent::LoopDetected {
                    agent: agent.name().to_string(),
                    turn,
                });
                return Ok(TurnOutcome::Finished {
                    output: loop_detected_output(agent.name(), state.idle_text_turns),
                    forced: true,
                });
            }
        } else {
            state.idle_text_turns = 0;
        }

        self.apply(state, &agent, next).await
    }

    async fn apply(
        &self,
        state: &mut RunState,
        agent: &Arc<Agent>,
        next: NextStep,
    ) -> crate::Result<TurnOutcome> {
        match next {
            NextStep::RunAgain => Ok(TurnOutcome::Continue),
            NextStep::Interruption { interruptions } => {
                info!(
                    agent = agent.name(),
                    pending = interruptions.len(),
                    "Run interrupted for approval"
                );
                self.observers.emit(&RunEvent::Interrupted {
                    agent: agent.name().to_string(),
                    pending: interruptions.len(),
                });
                state.pending_interruptions = interruptions;
                Ok(TurnOutcome::Interrupted)
            }
            NextStep::Handoff {
                new_agent,
                reason,
                context,
            } => {
                info!(from = agent.name(), to = new_agent.name(), "Handing off");
                self.observers.emit(&RunEvent::Handoff {
                    from: agent.name().to_string(),
                    to: new_agent.name().to_string(),
                    reason: reason.clone(),
                });
                state.pending_transfer = Some(TransferNote {
                    from: agent.name().to_string(),
                    to: new_agent.name().to_string(),
                    reason,
                    context,
                });
                state.messages = vec![Message::user(state.original_input.clone())];
                state.handoff_chain.record(new_agent.name());
                state.current_agent = new_agent;
                state.transferred = true;
                state.idle_text_turns = 0;
                Ok(TurnOutcome::Continue)
            }
            NextStep::FinalOutput { output } => {
                let report = self.check_output(state, agent, &output).await;
                if report.passed() {
                    return Ok(TurnOutcome::Finished {
                        output,
                        forced: false,
                    });
                }

                for failure in report.failures() {
                    let message = failure.message.clone().unwrap_or_default();
                    warn!(
                        guardrail = %failure.guardrail,
                        message = %message,
                        "Output guardrail failed, asking for a revision"
                    );
                    self.observers.emit(&RunEvent::GuardrailFailed {
                        guardrail: failure.guardrail.clone(),
                        kind: GuardrailKind::Output.to_string(),
                        message,
                    });
                }
                state.messages.push(Message::system(feedback_message(&report)));
                state.metrics_mut(agent.name()).record_guardrail_retry();
                Ok(TurnOutcome::Continue)
            }
        }
    }

    async fn generate(
        &self,
        agent: &Agent,
        request: GenerateRequest,
        cancellation: Option<&CancellationToken>,
        turn: u32,
    ) -> crate::Result<ModelResponse> {
        let generation = agent.model().generate(request);
        let result = match cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(crate::Error::Aborted {
                        agent: agent.name().to_string(),
                        turn,
                    });
                }
                result = generation => result,
            },
            None => generation.await,
        };

        result.map_err(|source| crate::Error::Model {
            agent: agent.name().to_string(),
            turn,
            source,
        })
    }

    async fn check_input(&self, state: &RunState) -> crate::Result<()> {
        let agent = &state.current_agent;
        let content = last_user_message(&state.messages)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let ctx = ExecutionContext::new(state.context.clone(), agent.name(), 0)
            .with_messages(state.messages.clone());

        let report = self.guarded(agent, GuardrailKind::Input, content, &ctx).await;
        let Some(failure) = report.first_failure() else {
            return Ok(());
        };

        let message = failure.message.clone().unwrap_or_default();
        self.observers.emit(&RunEvent::GuardrailFailed {
            guardrail: failure.guardrail.clone(),
            kind: GuardrailKind::Input.to_string(),
            message: message.clone(),
        });
        Err(crate::Error::InputGuardrailTripped {
            agent: agent.name().to_string(),
            guardrail: failure.guardrail.clone(),
            message,
        })
    }

    async fn check_output(&self, state: &RunState, agent: &Agent, output: &str) -> GuardrailReport {
        let ctx = ExecutionContext::new(state.context.clone(), agent.name(), state.current_turn)
            .with_messages(state.messages.clone());
        self.guarded(agent, GuardrailKind::Output, output, &ctx).await
    }

    /// Run the agent's guardrails of `kind` inside an observer span.
    async fn guarded(
        &self,
        agent: &Agent,
        kind: GuardrailKind,
        content: &str,
        ctx: &ExecutionContext,
    ) -> GuardrailReport {
        if !agent.guardrails().iter().any(|g| g.kind() == kind) {
            return run_guardrails(&[], kind, content, ctx).await;
        }
        let span = self.observers.begin(
            &format!("guardrails.{}", kind),
            json!({ "agent": agent.name(), "turn": ctx.turn }),
        );
        let report = run_guardrails(agent.guardrails(), kind, content, ctx).await;
        let failed: Vec<&str> = report.failures().map(|c| c.guardrail.as_str()).collect();
        span.end(json!({ "passed": report.passed(), "failed": failed }), None);
        report
    }

    async fn finish(&self, state: RunState, output: String, forced: bool) -> crate::Result<RunResult> {
        let agent = state.current_agent.clone();

        if let Some(session) = &self.session {
            let produced = state.produced_messages();
            if let Err(err) = session.add_messages(produced).await {
                return Err(self.fail(&state, err.into()));
            }
            debug!(session = session.id(), messages = produced.len(), "Persisted run messages");
        }

        let structured = match agent.output_schema() {
            Some(_) if !forced => Some(extract_structured(&output).into_value()),
            _ => None,
        };

        info!(
            agent = agent.name(),
            turns = state.current_turn,
            total_tokens = state.usage.total_tokens,
            handoffs = state.handoff_chain.len().saturating_sub(1),
            "Run completed"
        );
        self.observers.emit(&RunEvent::RunFinished {
            run_id: state.run_id.clone(),
            agent: agent.name().to_string(),
            turns: state.current_turn,
            total_tokens: state.usage.total_tokens,
        });

        Ok(RunResult::completed(state, output, structured))
    }

    fn fail(&self, state: &RunState, err: crate::Error) -> crate::Error {
        warn!(run_id = %state.run_id, error = %err, "Run failed");
        self.observers.emit(&RunEvent::RunFailed {
            run_id: state.run_id.clone(),
            error: err.to_string(),
        });
        err
    }
}

/// The bookkeeping result for a resolved transfer call. When approvals
/// take priority the model is told to ask again later.
fn transfer_result(request: &TransferRequest, next: &NextStep) -> ToolExecutionResult {
    match next {
        NextStep::Handoff { .. } => ToolExecutionResult::from_result(
            &request.call,
            Ok(json!({ "transferred_to": request.target.name() })),
            0,
        ),
        _ => ToolExecutionResult::failed(
            &request.call,
            ToolError::transfer(format!(
                "Transfer to {} was deferred because other tool calls are waiting for approval. \
                 Request the transfer again once they are resolved.",
                request.target.name()
            )),
        ),
    }
}

/// Lay a turn's results out in the order the model requested the calls.
///
/// `executed` holds one result per ordinary call, in request order. Every
/// position not taken by a rejected transfer call or by `skip` belongs to
/// the next executed result. Call ids are never used for matching, since
/// providers may repeat them or leave them empty.
fn merge_in_call_order(
    call_count: usize,
    executed: Vec<ToolExecutionResult>,
    rejected: Vec<(usize, ToolExecutionResult)>,
    skip: Option<usize>,
) -> Vec<ToolExecutionResult> {
    let mut slots: Vec<Option<ToolExecutionResult>> = (0..call_count).map(|_| None).collect();
    let mut overflow = Vec::new();
    for (index, result) in rejected {
        match slots.get_mut(index) {
            Some(slot) => *slot = Some(result),
            None => overflow.push(result),
        }
    }

    let mut executed = executed.into_iter();
    for (index, slot) in slots.iter_mut().enumerate() {
        if slot.is_none() && Some(index) != skip {
            *slot = executed.next();
        }
    }

    slots
        .into_iter()
        .flatten()
        .chain(executed)
        .chain(overflow)
        .collect()
}

fn batch_summary(results: &[ToolExecutionResult]) -> serde_json::Value {
    json!({
        "results": results.len(),
        "errors": results.iter().filter(|r| r.is_error()).count(),
        "pending": results.iter().filter(|r| r.is_pending_approval()).count(),
    })
}

fn append_tool_messages(state: &mut RunState, agent: &Agent, results: &[ToolExecutionResult]) {
    for result in results {
        let content = state.budget.admit(result.content(), agent.tokenizer());
        state
            .messages
            .push(Message::tool(&result.call_id, &result.tool_name, content));
    }
}
