//! # agent-engine
//!
//! Execution engine for tool-using, multi-agent LLM workflows.
//!
//! A [`Runner`] drives an [`Agent`] through a bounded turn loop: one model
//! call per turn, parallel tool execution in fixed-size batches, transfers
//! to sub-agents with isolated context, input and output guardrails, and
//! human approval of gated tool calls with suspend and resume.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use agent_engine::model::ScriptedModel;
//! use agent_engine::types::{ModelResponse, ToolCall};
//! use agent_engine::{Agent, RunOptions, Runner};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> agent_engine::Result<()> {
//! let billing = Arc::new(
//!     Agent::builder("Billing")
//!         .instructions("Answer billing questions.")
//!         .model(Arc::new(ScriptedModel::new([ModelResponse::text("Your total is $120.")])))
//!         .build()?,
//! );
//! let router = Arc::new(
//!     Agent::builder("Router")
//!         .instructions("Route the user to the right specialist.")
//!         .model(Arc::new(ScriptedModel::new([ModelResponse::tool_calls(vec![
//!             ToolCall::new("c1", "transfer_to_billing", json!({"reason": "billing question"})),
//!         ])])))
//!         .subagent(billing)
//!         .build()?,
//! );
//!
//! let result = Runner::new()
//!     .execute(&router, "What's my invoice total?", RunOptions::default())
//!     .await?;
//! assert_eq!(result.final_output.as_deref(), Some("Your total is $120."));
//! assert_eq!(result.metadata.handoff_chain, ["Router", "Billing"]);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod agent;
pub mod config;
pub mod guardrails;
pub mod handoff;
pub mod model;
pub mod observability;
pub mod output;
pub mod prelude;
pub mod session;
pub mod tokens;
pub mod tools;
pub mod types;

// Re-exports for convenience
pub use agent::{
    Agent, AgentBuilder, AgentMetrics, ApprovalDecision, Interruption, NextStep, RunMetadata,
    RunOptions, RunResult, RunSnapshot, RunState, Runner, StepResult,
};
pub use config::{ConfigError, EngineConfig};
pub use guardrails::{Guardrail, GuardrailKind, GuardrailOutcome};
pub use model::{GenerateRequest, Model, ModelError, ScriptedModel};
pub use observability::{Observer, RunEvent, TracingObserver};
pub use session::{MemorySession, Session, SessionError};
pub use tools::{ExecutionContext, FnTool, RunContext, SchemaTool, Tool, ToolRegistry};
pub use types::{Message, ModelResponse, Role, ToolCall, ToolError, ToolResult, Usage};

/// Error type for agent-engine operations.
///
/// Fatal run errors carry the active agent and enough detail to act on
/// without re-running.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The run used up its turn limit.
    #[error(
        "Agent '{agent}' exceeded the maximum of {max_turns} turns. Last step: {last_step}. \
         Raise max_turns if the task needs more steps, or make sure the agent can reach a final \
         answer (check its instructions, should_finish and output guardrails)."
    )]
    MaxTurnsExceeded {
        agent: String,
        max_turns: u32,
        last_step: String,
    },

    /// An input guardrail rejected the user message.
    #[error(
        "Input guardrail '{guardrail}' rejected the input for agent '{agent}': {message}. \
         The input was not sent to the model."
    )]
    InputGuardrailTripped {
        agent: String,
        guardrail: String,
        message: String,
    },

    /// The model capability failed.
    #[error("Model call for agent '{agent}' failed on turn {turn}: {source}")]
    Model {
        agent: String,
        turn: u32,
        #[source]
        source: ModelError,
    },

    /// The run's cancellation token fired during a model call.
    #[error("Run aborted while agent '{agent}' was waiting on the model (turn {turn})")]
    Aborted { agent: String, turn: u32 },

    /// Resume was called with a state or decisions that do not fit.
    #[error("Invalid resume: {0}")]
    InvalidResume(String),

    /// A snapshot names an agent that is not reachable from the root.
    #[error("Agent '{name}' is not reachable from root agent '{root}'")]
    UnknownAgent { name: String, root: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Run-terminating failures (turn limit, input guardrail, model, abort)
    Fatal,
    /// Misuse of the resume API or snapshot restore
    Resume,
    /// Invalid configuration or agent setup
    Configuration,
    /// Session store, JSON or IO failures
    Storage,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MaxTurnsExceeded { .. }
            | Error::InputGuardrailTripped { .. }
            | Error::Model { .. }
            | Error::Aborted { .. } => ErrorCategory::Fatal,

            Error::InvalidResume(_) | Error::UnknownAgent { .. } => ErrorCategory::Resume,

            Error::Config(_) => ErrorCategory::Configuration,

            Error::Session(_) | Error::Json(_) | Error::Io(_) => ErrorCategory::Storage,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Fatal
    }

    pub fn is_resume_error(&self) -> bool {
        self.category() == ErrorCategory::Resume
    }

    pub fn is_configuration(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_storage(&self) -> bool {
        self.category() == ErrorCategory::Storage
    }

    /// The agent that was active when a fatal error occurred.
    pub fn agent(&self) -> Option<&str> {
        match self {
            Error::MaxTurnsExceeded { agent, .. }
            | Error::InputGuardrailTripped { agent, .. }
            | Error::Model { agent, .. }
            | Error::Aborted { agent, .. } => Some(agent),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
