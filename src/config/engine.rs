use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult, EnvConfigProvider};
use crate::tools::DEFAULT_BATCH_SIZE;

pub const ENV_PREFIX: &str = "AGENT_ENGINE_";
pub const DEFAULT_MAX_TURNS: u32 = 50;
pub const DEFAULT_LOOP_THRESHOLD: u32 = 2;

/// Engine-wide knobs, passed explicitly to the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_turns: u32,
    pub tool_batch_size: usize,
    /// Consecutive text-only steps rejected by a custom finish check
    /// before the run is force-finished.
    pub loop_detection_threshold: u32,
    /// Token budget for tool results appended to the history.
    pub token_budget: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            tool_batch_size: DEFAULT_BATCH_SIZE,
            loop_detection_threshold: DEFAULT_LOOP_THRESHOLD,
            token_budget: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_provider(&EnvConfigProvider::prefixed(ENV_PREFIX))
    }

    pub fn from_provider(provider: &EnvConfigProvider) -> ConfigResult<Self> {
        let mut config = Self::default();
        if let Some(v) = provider.get("max_turns")? {
            config.max_turns = v;
        }
        if let Some(v) = provider.get("tool_batch_size")? {
            config.tool_batch_size = v;
        }
        if let Some(v) = provider.get("loop_threshold")? {
            config.loop_detection_threshold = v;
        }
        if let Some(v) = provider.get("token_budget")? {
            config.token_budget = Some(v);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_turns == 0 {
            return Err(ConfigError::invalid("max_turns", "must be at least 1"));
        }
        if self.tool_batch_size == 0 {
            return Err(ConfigError::invalid("tool_batch_size", "must be at least 1"));
        }
        if self.loop_detection_threshold == 0 {
            return Err(ConfigError::invalid(
                "loop_detection_threshold",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_tool_batch_size(mut self, size: usize) -> Self {
        self.tool_batch_size = size;
        self
    }

    pub fn with_loop_detection_threshold(mut self, threshold: u32) -> Self {
        self.loop_detection_threshold = threshold;
        self
    }

    pub fn with_token_budget(mut self, budget: u64) -> Self {
        self.token_budget = Some(budget);
        self
    }
}
