//! Batched, approval-gated tool execution.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;

use super::context::ExecutionContext;
use super::registry::ToolRegistry;
use crate::types::{ToolCall, ToolError, ToolExecutionResult};

pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Runs a turn's tool calls in fixed-size concurrent batches.
///
/// Calls inside a batch run concurrently on the caller's task; batches run
/// one after another. Results always follow request order.
#[derive(Debug, Clone, Copy)]
pub struct ToolExecutor {
    batch_size: usize,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl ToolExecutor {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Gate and execute `calls`.
    ///
    /// Calls to unknown tools or tools resolved as disabled come back as
    /// pending approvals without running.
    pub async fn execute(
        &self,
        registry: &ToolRegistry,
        calls: &[ToolCall],
        enabled: &HashMap<String, bool>,
        ctx: &ExecutionContext,
    ) -> Vec<ToolExecutionResult> {
        let mut slots: Vec<Option<ToolExecutionResult>> = vec![None; calls.len()];
        let mut permitted = Vec::new();

        for (index, call) in calls.iter().enumerate() {
            let allowed = registry.contains(&call.name)
                && enabled.get(&call.name).copied().unwrap_or(true);
            if allowed {
                permitted.push((index, call));
            } else {
                tracing::debug!(tool = %call.name, call_id = %call.id, "Tool call requires approval");
                slots[index] = Some(ToolExecutionResult::pending_approval(call));
            }
        }

        for (index, result) in self.run_batches(registry, permitted, ctx).await {
            slots[index] = Some(result);
        }

        slots.into_iter().flatten().collect()
    }

    /// Execute calls a human already approved, skipping enablement.
    pub async fn execute_approved(
        &self,
        registry: &ToolRegistry,
        calls: &[ToolCall],
        ctx: &ExecutionContext,
    ) -> Vec<ToolExecutionResult> {
        let indexed = calls.iter().enumerate().collect();
        self.run_batches(registry, indexed, ctx)
            .await
            .into_iter()
            .map(|(_, result)| result.with_approval(true))
            .collect()
    }

    async fn run_batches<'a>(
        &self,
        registry: &ToolRegistry,
        calls: Vec<(usize, &'a ToolCall)>,
        ctx: &ExecutionContext,
    ) -> Vec<(usize, ToolExecutionResult)> {
        let mut results = Vec::with_capacity(calls.len());

        for (batch_index, batch) in calls.chunks(self.batch_size).enumerate() {
            tracing::debug!(batch = batch_index, size = batch.len(), "Executing tool batch");
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|&(index, call)| async move { (index, run_one(registry, call, ctx).await) }),
            )
            .await;
            results.extend(outcomes);
        }

        results
    }
}

async fn run_one(
    registry: &ToolRegistry,
    call: &ToolCall,
    ctx: &ExecutionContext,
) -> ToolExecutionResult {
    let Some(tool) = registry.get(&call.name) else {
        return ToolExecutionResult::failed(call, ToolError::unknown_tool(&call.name));
    };

    let call_ctx = ctx.for_call(&call.id);
    let start = Instant::now();
    let outcome = AssertUnwindSafe(tool.execute(call.args.clone(), &call_ctx))
        .catch_unwind()
        .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let result = outcome.unwrap_or_else(|panic| Err(ToolError::panicked(panic_message(panic.as_ref()))));
    if let Err(ref e) = result {
        tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
    }
    ToolExecutionResult::from_result(call, result, duration_ms)
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
