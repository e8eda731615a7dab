//! Tool authoring, registration and batched execution.

mod context;
mod executor;
mod function;
mod registry;
mod traits;

pub use context::{ExecutionContext, RunContext};
pub use executor::{DEFAULT_BATCH_SIZE, ToolExecutor};
pub(crate) use executor::panic_message;
pub use function::FnTool;
pub use registry::ToolRegistry;
pub use traits::{Enablement, EnablementPredicate, SchemaTool, Tool};
