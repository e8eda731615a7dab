//! Built-in guardrails.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use regex::Regex;

use super::{FailureCategory, Guardrail, GuardrailError, GuardrailKind, GuardrailOutcome};
use crate::output::{ExtractedOutput, extract_structured};
use crate::tools::ExecutionContext;

/// Simple length-based guardrail, counted in characters.
#[derive(Debug, Clone)]
pub struct MaxLengthGuardrail {
    max_length: usize,
    kind: GuardrailKind,
}

impl MaxLengthGuardrail {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            kind: GuardrailKind::Output,
        }
    }

    pub fn for_input(mut self) -> Self {
        self.kind = GuardrailKind::Input;
        self
    }
}

#[async_trait]
impl Guardrail for MaxLengthGuardrail {
    fn name(&self) -> &str {
        "max_length"
    }

    fn kind(&self) -> GuardrailKind {
        self.kind
    }

    async fn validate(
        &self,
        content: &str,
        _context: &ExecutionContext,
    ) -> Result<GuardrailOutcome, GuardrailError> {
        let length = content.chars().count();
        if length > self.max_length {
            return Ok(GuardrailOutcome::fail(format!(
                "{} characters, limit is {}",
                length, self.max_length
            ))
            .with_category(FailureCategory::TooLong));
        }
        Ok(GuardrailOutcome::pass())
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
    })
}

fn ssn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid ssn regex"))
}

fn card_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:\d[ -]?){12,15}\d\b").expect("valid card regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\+\d{1,3}[ .-]?)?\(?\b\d{3}\)?[ .-]\d{3}[ .-]\d{4}\b")
            .expect("valid phone regex")
    })
}

/// Flags email addresses, phone numbers, payment card numbers and SSNs.
#[derive(Debug, Clone)]
pub struct PiiGuardrail {
    kind: GuardrailKind,
}

impl Default for PiiGuardrail {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiGuardrail {
    pub fn new() -> Self {
        Self {
            kind: GuardrailKind::Output,
        }
    }

    pub fn for_input(mut self) -> Self {
        self.kind = GuardrailKind::Input;
        self
    }

    fn detect(content: &str) -> Vec<&'static str> {
        let mut found = Vec::new();
        if email_regex().is_match(content) {
            found.push("email address");
        }
        if ssn_regex().is_match(content) {
            found.push("social security number");
        }
        if card_regex().is_match(content) {
            found.push("payment card number");
        }
        if phone_regex().is_match(content) {
            found.push("phone number");
        }
        found
    }
}

#[async_trait]
impl Guardrail for PiiGuardrail {
    fn name(&self) -> &str {
        "pii"
    }

    fn kind(&self) -> GuardrailKind {
        self.kind
    }

    async fn validate(
        &self,
        content: &str,
        _context: &ExecutionContext,
    ) -> Result<GuardrailOutcome, GuardrailError> {
        let found = Self::detect(content);
        if found.is_empty() {
            return Ok(GuardrailOutcome::pass());
        }
        Ok(GuardrailOutcome::fail(format!("detected {}", found.join(", ")))
            .with_category(FailureCategory::ContainsPii))
    }
}

/// Regex blocklist.
#[derive(Debug, Clone)]
pub struct BlocklistGuardrail {
    name: String,
    kind: GuardrailKind,
    patterns: Vec<Regex>,
}

impl BlocklistGuardrail {
    pub fn new(name: impl Into<String>, kind: GuardrailKind) -> Self {
        Self {
            name: name.into(),
            kind,
            patterns: Vec::new(),
        }
    }

    pub fn add_pattern(mut self, pattern: &str) -> Result<Self, GuardrailError> {
        self.patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Case-insensitive whole-word match for each term.
    pub fn add_terms<I, S>(mut self, terms: I) -> Result<Self, GuardrailError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for term in terms {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(term.as_ref()));
            self.patterns.push(Regex::new(&pattern)?);
        }
        Ok(self)
    }
}

#[async_trait]
impl Guardrail for BlocklistGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> GuardrailKind {
        self.kind
    }

    async fn validate(
        &self,
        content: &str,
        _context: &ExecutionContext,
    ) -> Result<GuardrailOutcome, GuardrailError> {
        let hits: Vec<&str> = self
            .patterns
            .iter()
            .filter_map(|p| p.find(content).map(|m| m.as_str()))
            .collect();
        if hits.is_empty() {
            return Ok(GuardrailOutcome::pass());
        }
        Ok(GuardrailOutcome::fail(format!("blocked content: {}", hits.join(", ")))
            .with_category(FailureCategory::Blocked))
    }
}

/// Requires a structured JSON payload, bare or inside a fenced block.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatGuardrail {
    required_keys: Vec<String>,
}

impl JsonFormatGuardrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys.extend(keys.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl Guardrail for JsonFormatGuardrail {
    fn name(&self) -> &str {
        "json_format"
    }

    fn kind(&self) -> GuardrailKind {
        GuardrailKind::Output
    }

    async fn validate(
        &self,
        content: &str,
        _context: &ExecutionContext,
    ) -> Result<GuardrailOutcome, GuardrailError> {
        let value = match extract_structured(content) {
            ExtractedOutput::Direct(value) | ExtractedOutput::Fenced(value) => value,
            ExtractedOutput::Raw(_) => {
                return Ok(GuardrailOutcome::fail("response is not valid JSON")
                    .with_category(FailureCategory::InvalidFormat));
            }
        };

        let missing: Vec<&str> = self
            .required_keys
            .iter()
            .filter(|k| value.get(k.as_str()).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Ok(GuardrailOutcome::fail(format!(
                "missing required keys: {}",
                missing.join(", ")
            ))
            .with_category(FailureCategory::InvalidFormat));
        }
        Ok(GuardrailOutcome::pass())
    }
}

type CheckFn = Arc<
    dyn Fn(String, ExecutionContext) -> BoxFuture<'static, Result<GuardrailOutcome, GuardrailError>>
        + Send
        + Sync,
>;

/// Guardrail that uses a custom async function
#[derive(Clone)]
pub struct FnGuardrail {
    name: String,
    kind: GuardrailKind,
    check: CheckFn,
}

impl FnGuardrail {
    pub fn new<F, Fut>(name: impl Into<String>, kind: GuardrailKind, check: F) -> Self
    where
        F: Fn(String, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GuardrailOutcome, GuardrailError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind,
            check: Arc::new(move |content, ctx| check(content, ctx).boxed()),
        }
    }
}

impl std::fmt::Debug for FnGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnGuardrail")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

#[async_trait]
impl Guardrail for FnGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> GuardrailKind {
        self.kind
    }

    async fn validate(
        &self,
        content: &str,
        context: &ExecutionContext,
    ) -> Result<GuardrailOutcome, GuardrailError> {
        (self.check)(content.to_string(), context.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::RunContext;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(RunContext::new(), "agent", 1)
    }

    #[tokio::test]
    async fn test_max_length_counts_chars() {
        let guardrail = MaxLengthGuardrail::new(4);
        assert!(guardrail.validate("ünïc", &ctx()).await.unwrap().passed);
        let outcome = guardrail.validate("hello", &ctx()).await.unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.category, Some(FailureCategory::TooLong));
        assert_eq!(outcome.message.as_deref(), Some("5 characters, limit is 4"));
    }

    #[tokio::test]
    async fn test_pii_detection() {
        let guardrail = PiiGuardrail::new();
        let clean = guardrail.validate("Your invoice total is $120.", &ctx()).await.unwrap();
        assert!(clean.passed);

        let leaked = guardrail
            .validate("Reach jane@example.com or 555-123-4567, SSN 123-45-6789", &ctx())
            .await
            .unwrap();
        assert!(!leaked.passed);
        let message = leaked.message.unwrap();
        assert!(message.contains("email address"));
        assert!(message.contains("social security number"));
        assert!(message.contains("phone number"));

        let card = guardrail.validate("card 4111 1111 1111 1111", &ctx()).await.unwrap();
        assert!(card.message.unwrap().contains("payment card number"));
    }

    #[tokio::test]
    async fn test_blocklist_terms() {
        let guardrail = BlocklistGuardrail::new("competitors", GuardrailKind::Input)
            .add_terms(["AcmeCorp", "Globex"])
            .unwrap();
        assert_eq!(guardrail.kind(), GuardrailKind::Input);
        assert!(guardrail.validate("we love acme", &ctx()).await.unwrap().passed);

        let hit = guardrail.validate("Try acmecorp instead", &ctx()).await.unwrap();
        assert!(!hit.passed);
        assert_eq!(hit.category, Some(FailureCategory::Blocked));

        assert!(BlocklistGuardrail::new("bad", GuardrailKind::Output).add_pattern("(").is_err());
    }

    #[tokio::test]
    async fn test_json_format() {
        let guardrail = JsonFormatGuardrail::new().require_keys(["total"]);
        assert!(guardrail.validate(r#"{"total": 3}"#, &ctx()).await.unwrap().passed);
        assert!(
            guardrail
                .validate("Here:\n```json\n{\"total\": 3}\n```", &ctx())
                .await
                .unwrap()
                .passed
        );

        let missing = guardrail.validate(r#"{"sum": 3}"#, &ctx()).await.unwrap();
        assert_eq!(missing.message.as_deref(), Some("missing required keys: total"));
        assert!(!guardrail.validate("plain text", &ctx()).await.unwrap().passed);
    }

    #[tokio::test]
    async fn test_fn_guardrail_reads_context() {
        let guardrail = FnGuardrail::new("tier", GuardrailKind::Input, |content, ctx| async move {
            if ctx.context.get_as::<String>("tier").as_deref() == Some("free") && content.len() > 5 {
                return Ok(GuardrailOutcome::fail("free tier prompts are short"));
            }
            Ok(GuardrailOutcome::pass())
        });
        let ctx = ctx();
        assert!(guardrail.validate("long prompt", &ctx).await.unwrap().passed);
        ctx.context.insert("tier", serde_json::json!("free"));
        assert!(!guardrail.validate("long prompt", &ctx).await.unwrap().passed);
    }
}
