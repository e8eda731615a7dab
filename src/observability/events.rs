use serde::Serialize;

/// Progress notifications emitted by the runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        agent: String,
    },
    RunResumed {
        run_id: String,
        agent: String,
        decisions: usize,
    },
    TurnStarted {
        run_id: String,
        agent: String,
        turn: u32,
    },
    ToolsExecuted {
        agent: String,
        turn: u32,
        calls: usize,
        errors: usize,
        pending: usize,
    },
    Handoff {
        from: String,
        to: String,
        reason: Option<String>,
    },
    GuardrailFailed {
        guardrail: String,
        kind: String,
        message: String,
    },
    LoopDetected {
        agent: String,
        turn: u32,
    },
    Interrupted {
        agent: String,
        pending: usize,
    },
    RunFinished {
        run_id: String,
        agent: String,
        turns: u32,
        total_tokens: u64,
    },
    RunFailed {
        run_id: String,
        error: String,
    },
}

impl RunEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::RunResumed { .. } => "run_resumed",
            Self::TurnStarted { .. } => "turn_started",
            Self::ToolsExecuted { .. } => "tools_executed",
            Self::Handoff { .. } => "handoff",
            Self::GuardrailFailed { .. } => "guardrail_failed",
            Self::LoopDetected { .. } => "loop_detected",
            Self::Interrupted { .. } => "interrupted",
            Self::RunFinished { .. } => "run_finished",
            Self::RunFailed { .. } => "run_failed",
        }
    }
}
