use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::context::ExecutionContext;
use super::traits::{Enablement, Tool};
use crate::types::ToolResult;

type Handler = Arc<dyn Fn(Value, ExecutionContext) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// Closure-backed tool.
///
/// ```rust
/// use agent_engine::tools::FnTool;
/// use serde_json::json;
///
/// let tool = FnTool::new("add", "Add two integers", |args, _ctx| async move {
///     Ok(json!(args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0)))
/// })
/// .with_schema(json!({
///     "type": "object",
///     "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
///     "required": ["a", "b"]
/// }));
/// ```
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    enablement: Enablement,
    handler: Handler,
}

impl FnTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::json!({"type": "object", "properties": {}}),
            enablement: Enablement::Enabled,
            handler: Arc::new(move |args, ctx| handler(args, ctx).boxed()),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Every call needs a human decision before it runs.
    pub fn requires_approval(mut self) -> Self {
        self.enablement = Enablement::RequiresApproval;
        self
    }

    /// Re-evaluated at the start of every turn.
    pub fn enabled_when<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.enablement = Enablement::when(predicate);
        self
    }

    pub fn with_enablement(mut self, enablement: Enablement) -> Self {
        self.enablement = enablement;
        self
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("enablement", &self.enablement)
            .finish()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    fn enablement(&self) -> Enablement {
        self.enablement.clone()
    }

    async fn execute(&self, args: Value, context: &ExecutionContext) -> ToolResult {
        (self.handler)(args, context.clone()).await
    }
}
