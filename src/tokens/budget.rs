use serde::{Deserialize, Serialize};

use super::Tokenizer;

/// Replaces tool output once the run's token budget is spent.
pub const BUDGET_PLACEHOLDER: &str = "[result unavailable: token budget reached]";

/// Running token budget for tool results appended to the history.
///
/// Once `reached` flips it stays set for the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBudget {
    pub limit: Option<u64>,
    pub used: u64,
    pub reached: bool,
}

impl ResultBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            used: 0,
            reached: false,
        }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.limit.is_some()
    }

    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.used))
    }

    /// Returns the content to append: the original text while it fits,
    /// the placeholder afterwards.
    pub fn admit(&mut self, content: String, tokenizer: &Tokenizer) -> String {
        let Some(limit) = self.limit else {
            return content;
        };
        if self.reached {
            return BUDGET_PLACEHOLDER.to_string();
        }

        let estimate = tokenizer(&content);
        if self.used.saturating_add(estimate) > limit {
            self.reached = true;
            tracing::debug!(used = self.used, estimate, limit, "Tool result token budget reached");
            return BUDGET_PLACEHOLDER.to_string();
        }

        self.used += estimate;
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::default_tokenizer;

    #[test]
    fn test_unlimited_passes_everything() {
        let tokenizer = default_tokenizer();
        let mut budget = ResultBudget::unlimited();
        let big = "x".repeat(10_000);
        assert_eq!(budget.admit(big.clone(), &tokenizer), big);
        assert!(!budget.reached);
        assert_eq!(budget.remaining(), None);
    }

    #[test]
    fn test_reached_is_monotonic() {
        let tokenizer = default_tokenizer();
        let mut budget = ResultBudget::new(Some(5));

        assert_eq!(budget.admit("abcdefgh".into(), &tokenizer), "abcdefgh");
        assert_eq!(budget.used, 2);

        let too_big = "x".repeat(40);
        assert_eq!(budget.admit(too_big, &tokenizer), BUDGET_PLACEHOLDER);
        assert!(budget.reached);

        // Would fit by itself, but the budget is already spent.
        assert_eq!(budget.admit("a".into(), &tokenizer), BUDGET_PLACEHOLDER);
        assert_eq!(budget.used, 2);
    }

    #[test]
    fn test_custom_tokenizer() {
        let tokenizer: Tokenizer = std::sync::Arc::new(|s: &str| s.split_whitespace().count() as u64);
        let mut budget = ResultBudget::new(Some(3));
        assert_eq!(budget.admit("one two".into(), &tokenizer), "one two");
        assert_eq!(budget.admit("three four".into(), &tokenizer), BUDGET_PLACEHOLDER);
        assert_eq!(budget.remaining(), Some(1));
    }
}
