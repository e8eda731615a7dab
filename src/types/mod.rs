//! Core data types shared by the engine and its collaborators.

mod message;
mod response;
mod tool;

pub use message::{Message, Role, last_user_message};
pub use response::{FinishReason, ModelResponse, Usage};
pub use tool::{ToolCall, ToolDefinition, ToolError, ToolExecutionResult, ToolResult};
