//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits
//! for defining agents and running them.
//!
//! # Usage
//!
//! ```rust
//! use agent_engine::prelude::*;
//! ```

// Core types
pub use crate::agent::{
    Agent, AgentBuilder, ApprovalDecision, Interruption, RunOptions, RunResult, RunSnapshot,
    RunState, Runner,
};
pub use crate::Error;
pub use crate::Result;

// Configuration
pub use crate::config::EngineConfig;

// Model
pub use crate::model::{GenerateRequest, GenerationSettings, Model, ModelError, ScriptedModel};

// Tools
pub use crate::tools::{
    Enablement, ExecutionContext, FnTool, RunContext, SchemaTool, Tool, ToolRegistry,
};
pub use crate::types::ToolResult;

// Guardrails
pub use crate::guardrails::{Guardrail, GuardrailKind, GuardrailOutcome};

// Types
pub use crate::types::{FinishReason, Message, ModelResponse, Role, ToolCall, ToolError, Usage};

// Session
pub use crate::session::{MemorySession, Session};
