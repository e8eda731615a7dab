use std::sync::Arc;

/// Maps text to an estimated token count.
pub type Tokenizer = Arc<dyn Fn(&str) -> u64 + Send + Sync>;

/// Character-count heuristic: ⌈chars / 4⌉.
#[inline]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

pub fn default_tokenizer() -> Tokenizer {
    Arc::new(estimate_tokens)
}
