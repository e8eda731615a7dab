//! Engine configuration.
//!
//! ```rust
//! use agent_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{"max_turns": 12}"#).unwrap();
//! assert_eq!(config.max_turns, 12);
//! assert_eq!(config.tool_batch_size, 3);
//! ```

mod engine;
mod env;

pub use engine::{DEFAULT_LOOP_THRESHOLD, DEFAULT_MAX_TURNS, ENV_PREFIX, EngineConfig};
pub use env::EnvConfigProvider;

use thiserror::Error;

/// Errors that can occur while building or loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    Missing { field: &'static str },

    /// Invalid configuration value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
