//! Tool trait definitions.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use super::context::ExecutionContext;
use crate::types::{ToolDefinition, ToolError, ToolResult};

pub type EnablementPredicate =
    Arc<dyn Fn(&ExecutionContext) -> BoxFuture<'static, bool> + Send + Sync>;

/// Whether a tool may run without a human decision.
///
/// Resolved once per turn. A tool that resolves to disabled stays visible
/// to the model; calling it produces an approval request.
#[derive(Clone, Default)]
pub enum Enablement {
    #[default]
    Enabled,
    RequiresApproval,
    Predicate(EnablementPredicate),
}

impl Enablement {
    pub fn when<F, Fut>(predicate: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::Predicate(Arc::new(move |ctx| predicate(ctx).boxed()))
    }

    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(move |ctx| {
            let enabled = predicate(ctx);
            async move { enabled }.boxed()
        }))
    }

    /// A panicking predicate resolves to disabled.
    pub async fn resolve(&self, ctx: &ExecutionContext) -> bool {
        match self {
            Self::Enabled => true,
            Self::RequiresApproval => false,
            Self::Predicate(predicate) => {
                let evaluated = std::panic::catch_unwind(AssertUnwindSafe(|| predicate(ctx)));
                let outcome = match evaluated {
                    Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
                    Err(panic) => Err(panic),
                };
                outcome.unwrap_or_else(|_| {
                    tracing::warn!(agent = %ctx.agent_name, "Enablement predicate panicked; gating tool");
                    false
                })
            }
        }
    }
}

impl fmt::Debug for Enablement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("Enabled"),
            Self::RequiresApproval => f.write_str("RequiresApproval"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;

    fn enablement(&self) -> Enablement {
        Enablement::Enabled
    }

    async fn execute(&self, args: serde_json::Value, context: &ExecutionContext) -> ToolResult;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// Schema-based tool trait with automatic JSON schema generation.
///
/// Provides a higher-level abstraction over `Tool` with typed inputs
/// and automatic schema derivation via schemars.
#[async_trait]
pub trait SchemaTool: Send + Sync {
    type Input: JsonSchema + DeserializeOwned + Send;
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    async fn handle(&self, input: Self::Input, context: &ExecutionContext) -> ToolResult;

    fn enablement(&self) -> Enablement {
        Enablement::Enabled
    }

    fn input_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(Self::Input);
        let mut value =
            serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));

        if let Some(obj) = value.as_object_mut()
            && !obj.contains_key("properties")
        {
            obj.insert(
                "properties".to_string(),
                serde_json::Value::Object(serde_json::Map::new()),
            );
        }

        value
    }
}

#[async_trait]
impl<T: SchemaTool + 'static> Tool for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        T::DESCRIPTION
    }

    fn input_schema(&self) -> serde_json::Value {
        T::input_schema()
    }

    fn enablement(&self) -> Enablement {
        SchemaTool::enablement(self)
    }

    async fn execute(&self, args: serde_json::Value, context: &ExecutionContext) -> ToolResult {
        match serde_json::from_value::<T::Input>(args) {
            Ok(typed) => SchemaTool::handle(self, typed, context).await,
            Err(e) => Err(ToolError::invalid_input(e.to_string())),
        }
    }
}
