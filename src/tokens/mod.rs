//! Token accounting: usage counters, estimation and the tool-result budget.

mod budget;
mod estimate;
mod usage;

pub use budget::{BUDGET_PLACEHOLDER, ResultBudget};
pub use estimate::{Tokenizer, default_tokenizer, estimate_tokens};
pub use usage::UsageCounter;
