use super::{FailureCategory, GuardrailCheck, GuardrailReport};

/// Corrective instruction for one failed output check.
pub fn feedback_for(check: &GuardrailCheck) -> String {
    let detail = check.message.as_deref().unwrap_or("no details provided");
    match check.category() {
        FailureCategory::TooLong => format!(
            "Your previous response was too long ({}). Rewrite it more concisely.",
            detail
        ),
        FailureCategory::ContainsPii => format!(
            "Your previous response contained personal information ({}). Remove or redact it and answer again.",
            detail
        ),
        FailureCategory::InvalidFormat => format!(
            "Your previous response was not in the required format ({}). Answer again using the expected format.",
            detail
        ),
        FailureCategory::Blocked => format!(
            "Your previous response included disallowed content ({}). Answer again without it.",
            detail
        ),
        FailureCategory::Other => format!(
            "Your previous response failed the '{}' check: {}. Revise it and answer again.",
            check.guardrail, detail
        ),
    }
}

/// System message text covering every failed check of `report`.
pub fn feedback_message(report: &GuardrailReport) -> String {
    let lines: Vec<String> = report.failures().map(feedback_for).collect();
    match lines.len() {
        0 => String::new(),
        1 => lines.into_iter().next().unwrap_or_default(),
        _ => format!(
            "Your previous response failed {} checks:\n{}",
            lines.len(),
            lines
                .iter()
                .map(|l| format!("- {}", l))
                .collect::<Vec<_>>()
                .join("\n")
        ),
    }
}
