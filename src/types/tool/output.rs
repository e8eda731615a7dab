//! Tool execution outcome types.

use serde::{Deserialize, Serialize};

use super::definition::ToolCall;
use super::error::ToolError;

/// What a tool's `execute` returns.
pub type ToolResult = Result<serde_json::Value, ToolError>;

/// Per-call record produced by the tool executor.
///
/// An unresolved approval is `needs_approval = true`, `approved = false`
/// with neither `result` nor `error` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub call_id: String,
    pub tool_name: String,
    pub args: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub needs_approval: bool,
    #[serde(default)]
    pub approved: bool,
}

impl ToolExecutionResult {
    pub fn from_result(call: &ToolCall, result: ToolResult, duration_ms: u64) -> Self {
        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            args: call.args.clone(),
            result,
            error,
            duration_ms,
            needs_approval: false,
            approved: false,
        }
    }

    pub fn failed(call: &ToolCall, error: ToolError) -> Self {
        Self::from_result(call, Err(error), 0)
    }

    pub fn pending_approval(call: &ToolCall) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            args: call.args.clone(),
            result: None,
            error: None,
            duration_ms: 0,
            needs_approval: true,
            approved: false,
        }
    }

    /// Mark this record as having passed through an approval decision.
    pub fn with_approval(mut self, approved: bool) -> Self {
        self.needs_approval = true;
        self.approved = approved;
        self
    }

    pub fn is_pending_approval(&self) -> bool {
        self.needs_approval && !self.approved && self.result.is_none() && self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Text handed back to the model as the tool message body.
    pub fn content(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Error: {}", error);
        }
        match &self.result {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(value) => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> ToolCall {
        ToolCall::new("call_1", "lookup", json!({"id": 7}))
    }

    #[test]
    fn test_from_result_success_and_error() {
        let ok = ToolExecutionResult::from_result(&call(), Ok(json!({"total": 42})), 5);
        assert!(!ok.is_error());
        assert_eq!(ok.content(), r#"{"total":42}"#);
        assert_eq!(ok.duration_ms, 5);

        let err = ToolExecutionResult::from_result(
            &call(),
            Err(ToolError::execution_failed("boom")),
            1,
        );
        assert!(err.is_error());
        assert_eq!(err.content(), "Error: execution failed: boom");
    }

    #[test]
    fn test_string_results_are_not_quoted() {
        let ok = ToolExecutionResult::from_result(&call(), Ok(json!("plain")), 0);
        assert_eq!(ok.content(), "plain");
    }

    #[test]
    fn test_pending_approval_shape() {
        let pending = ToolExecutionResult::pending_approval(&call());
        assert!(pending.is_pending_approval());
        assert!(pending.needs_approval);
        assert!(!pending.approved);
        assert!(pending.result.is_none());

        let rejected = ToolExecutionResult::failed(&call(), ToolError::rejected(None))
            .with_approval(false);
        assert!(!rejected.is_pending_approval());
        assert!(rejected.needs_approval);
    }
}
