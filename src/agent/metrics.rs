//! Per-agent execution metrics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ToolExecutionResult, Usage};

/// Accumulated across every visit to the same agent within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub turns: u32,
    pub tool_calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub errors: usize,
    pub guardrail_retries: u32,
    pub execution_time_ms: u64,
    pub api_time_ms: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_stats: BTreeMap<String, ToolStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStats {
    pub calls: usize,
    pub total_time_ms: u64,
    pub errors: usize,
}

impl AgentMetrics {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn add_usage(&mut self, usage: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(usage.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(usage.output_tokens);
    }

    pub fn record_turn(&mut self, duration_ms: u64) {
        self.turns += 1;
        self.execution_time_ms += duration_ms;
    }

    pub fn record_api_call(&mut self, duration_ms: u64) {
        self.api_time_ms += duration_ms;
    }

    pub fn record_tool(&mut self, name: &str, duration_ms: u64, is_error: bool) {
        self.tool_calls += 1;
        let stats = self.tool_stats.entry(name.to_string()).or_default();
        stats.calls += 1;
        stats.total_time_ms += duration_ms;
        if is_error {
            stats.errors += 1;
            self.errors += 1;
        }
    }

    /// Pending approvals are not counted until they resolve.
    pub fn record_results(&mut self, results: &[ToolExecutionResult]) {
        for result in results.iter().filter(|r| !r.is_pending_approval()) {
            self.record_tool(&result.tool_name, result.duration_ms, result.is_error());
        }
    }

    pub fn record_guardrail_retry(&mut self) {
        self.guardrail_retries += 1;
    }

    pub fn avg_tool_time_ms(&self) -> f64 {
        if self.tool_calls == 0 {
            return 0.0;
        }
        let total: u64 = self.tool_stats.values().map(|s| s.total_time_ms).sum();
        total as f64 / self.tool_calls as f64
    }
}
