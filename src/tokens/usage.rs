use serde::{Deserialize, Serialize};

use crate::types::Usage;

/// Accumulated token usage across turns and agents of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl UsageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, usage: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(usage.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(usage.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(usage.total());
    }

    pub fn merge(&mut self, other: &UsageCounter) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.input_tokens == 0 && self.output_tokens == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add() {
        let mut counter = UsageCounter::new();
        assert!(counter.is_empty());

        counter.add(&Usage::new(100, 50));
        counter.add(&Usage::new(10, 5));

        assert_eq!(counter.input_tokens, 110);
        assert_eq!(counter.output_tokens, 55);
        assert_eq!(counter.total_tokens, 165);
    }

    #[test]
    fn test_saturates() {
        let mut counter = UsageCounter {
            input_tokens: u64::MAX,
            output_tokens: 0,
            total_tokens: u64::MAX,
        };
        counter.add(&Usage::new(1, 1));
        assert_eq!(counter.input_tokens, u64::MAX);
        assert_eq!(counter.total_tokens, u64::MAX);
    }

    #[test]
    fn test_merge() {
        let mut a = UsageCounter::new();
        a.add(&Usage::new(1, 2));
        let mut b = UsageCounter::new();
        b.add(&Usage::new(3, 4));
        a.merge(&b);
        assert_eq!(a.total_tokens, 10);
    }
}
