//! Tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use super::context::ExecutionContext;
use super::traits::Tool;
use crate::types::ToolDefinition;

/// Registry of tools keyed by unique name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, handing back the rejected tool if the name is taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), Arc<dyn Tool>> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(tool);
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Evaluate every tool's enablement once for the current turn.
    pub async fn resolve_enablement(&self, ctx: &ExecutionContext) -> HashMap<String, bool> {
        let resolved = join_all(self.tools.iter().map(|(name, tool)| async move {
            let enabled = tool.enablement().resolve(ctx).await;
            (name.clone(), enabled)
        }))
        .await;
        resolved.into_iter().collect()
    }

    /// Definitions sorted by name. Tools missing from `enabled` count as enabled.
    pub fn definitions(&self, enabled: &HashMap<String, bool>) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                let gated = !enabled.get(name).copied().unwrap_or(true);
                tool.definition().with_requires_approval(gated)
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
