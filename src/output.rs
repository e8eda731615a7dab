//! Structured payload extraction from model text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Where a structured payload was found, in fallback order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedOutput {
    /// The whole (trimmed) text parsed as JSON.
    Direct(Value),
    /// The first fenced code block that parsed as JSON.
    Fenced(Value),
    /// Nothing parsed; the trimmed text.
    Raw(String),
}

impl ExtractedOutput {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Direct(v) | Self::Fenced(v) => Some(v),
            Self::Raw(_) => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Direct(v) | Self::Fenced(v) => v,
            Self::Raw(s) => Value::String(s),
        }
    }

    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Raw(_))
    }
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").expect("valid fence regex")
    })
}

/// Direct parse, then fenced block, then raw text.
///
/// Only objects and arrays count as structured; a bare `42` or `"text"`
/// falls through to the next step.
pub fn extract_structured(text: &str) -> ExtractedOutput {
    let trimmed = text.trim();

    if let Some(value) = parse_structured(trimmed) {
        return ExtractedOutput::Direct(value);
    }

    for captures in fence_regex().captures_iter(trimmed) {
        if let Some(body) = captures.get(1)
            && let Some(value) = parse_structured(body.as_str().trim())
        {
            return ExtractedOutput::Fenced(value);
        }
    }

    ExtractedOutput::Raw(trimmed.to_string())
}

fn parse_structured(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct() {
        assert_eq!(
            extract_structured("  {\"total\": 120}\n"),
            ExtractedOutput::Direct(json!({"total": 120}))
        );
        assert!(extract_structured("[1, 2]").is_structured());
    }

    #[test]
    fn test_fenced_skips_invalid_blocks() {
        let text = "Draft:\n```\nnot json\n```\nFinal:\n```json\n{\"total\": 120}\n```\nThanks!";
        assert_eq!(
            extract_structured(text),
            ExtractedOutput::Fenced(json!({"total": 120}))
        );
    }

    #[test]
    fn test_raw_fallback() {
        assert_eq!(
            extract_structured(" The total is 120. "),
            ExtractedOutput::Raw("The total is 120.".into())
        );
        // Scalars are not treated as structured payloads.
        assert_eq!(extract_structured("42"), ExtractedOutput::Raw("42".into()));
        assert_eq!(
            extract_structured("plain").into_value(),
            Value::String("plain".into())
        );
    }
}
