//! Per-run options.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::model::GenerationSettings;
use crate::tools::RunContext;

/// Overrides for a single `execute` or `resume` call.
///
/// Unset fields fall back to the runner's [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub context: Option<RunContext>,
    pub max_turns: Option<u32>,
    pub token_budget: Option<u64>,
    pub cancellation: Option<CancellationToken>,
    pub settings: GenerationSettings,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared payload visible to every tool and guardrail in the run.
    pub fn context(mut self, context: RunContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn context_value(self, value: Value) -> Self {
        self.context(RunContext::from_value(value))
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn token_budget(mut self, budget: u64) -> Self {
        self.token_budget = Some(budget);
        self
    }

    /// Cancelling the token aborts the in-flight model call.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }
}
