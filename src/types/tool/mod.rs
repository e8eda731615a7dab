//! Tool-related types.

mod definition;
mod error;
mod output;

pub use definition::{ToolCall, ToolDefinition};
pub use error::ToolError;
pub use output::{ToolExecutionResult, ToolResult};
