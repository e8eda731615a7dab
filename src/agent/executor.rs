//! Runner construction.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::observability::{Observer, ObserverSet};
use crate::session::Session;
use crate::tools::ToolExecutor;

/// Drives agents through the turn loop.
///
/// A runner holds no per-run state, so one instance can execute any number
/// of runs, concurrently or not.
#[derive(Clone)]
pub struct Runner {
    pub(crate) config: EngineConfig,
    pub(crate) session: Option<Arc<dyn Session>>,
    pub(crate) observers: ObserverSet,
    pub(crate) tools: ToolExecutor,
}

impl Runner {
    pub fn new() -> Self {
        Self::from_parts(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config))
    }

    pub fn from_env() -> crate::Result<Self> {
        Self::with_config(EngineConfig::from_env()?)
    }

    fn from_parts(config: EngineConfig) -> Self {
        Self {
            tools: ToolExecutor::new(config.tool_batch_size),
            config,
            session: None,
            observers: ObserverSet::new(),
        }
    }

    /// History is loaded once before the first turn and written once after
    /// a final output.
    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.register(observer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("session", &self.session.as_ref().map(|s| s.id().to_string()))
            .field("observers", &self.observers.len())
            .finish()
    }
}
