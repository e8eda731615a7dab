use serde::{Deserialize, Serialize};

/// Agents visited during a run, in first-visit order, each at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandoffChain(Vec<String>);

impl HandoffChain {
    pub fn new(root: impl Into<String>) -> Self {
        Self(vec![root.into()])
    }

    /// Returns `false` when the agent was already in the chain.
    pub fn record(&mut self, agent: &str) -> bool {
        if self.contains(agent) {
            return false;
        }
        self.0.push(agent.to_string());
        true
    }

    pub fn contains(&self, agent: &str) -> bool {
        self.0.iter().any(|a| a == agent)
    }

    pub fn root(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}
