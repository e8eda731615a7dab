//! Agent definitions and the runner that drives them.

mod approval;
mod definition;
mod execution;
mod executor;
mod metrics;
mod next_step;
mod options;
mod result;
mod state;

pub use approval::ApprovalDecision;
pub use definition::{Agent, AgentBuilder, DynamicInstructions, Instructions, ShouldFinish};
pub use executor::Runner;
pub use metrics::{AgentMetrics, ToolStats};
pub use next_step::{NextStep, determine_next_step};
pub use options::RunOptions;
pub use result::{RunMetadata, RunResult};
pub use state::{
    Interruption, InterruptionKind, RunSnapshot, RunState, StepResult, StepToolCall,
};
