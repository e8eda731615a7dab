use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::{FailureCategory, Guardrail, GuardrailKind};
use crate::tools::{ExecutionContext, panic_message};

/// One guardrail's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailCheck {
    pub guardrail: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FailureCategory>,
    /// The validator errored or panicked instead of returning a verdict.
    #[serde(default)]
    pub errored: bool,
}

impl GuardrailCheck {
    pub fn category(&self) -> FailureCategory {
        self.category.unwrap_or_else(|| {
            FailureCategory::infer(&self.guardrail, self.message.as_deref().unwrap_or_default())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailReport {
    pub kind: GuardrailKind,
    pub checks: Vec<GuardrailCheck>,
}

impl GuardrailReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &GuardrailCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn first_failure(&self) -> Option<&GuardrailCheck> {
        self.failures().next()
    }
}

/// Run every guardrail of `kind` concurrently and wait for all of them.
pub async fn run_guardrails(
    guardrails: &[Arc<dyn Guardrail>],
    kind: GuardrailKind,
    content: &str,
    ctx: &ExecutionContext,
) -> GuardrailReport {
    let checks = join_all(
        guardrails
            .iter()
            .filter(|g| g.kind() == kind)
            .map(|guardrail| check_one(guardrail.as_ref(), content, ctx)),
    )
    .await;

    GuardrailReport { kind, checks }
}

async fn check_one(guardrail: &dyn Guardrail, content: &str, ctx: &ExecutionContext) -> GuardrailCheck {
    let name = guardrail.name().to_string();
    let outcome = AssertUnwindSafe(guardrail.validate(content, ctx))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(outcome)) => GuardrailCheck {
            guardrail: name,
            passed: outcome.passed,
            message: outcome.message,
            category: outcome.category,
            errored: false,
        },
        Ok(Err(e)) => {
            tracing::warn!(guardrail = %name, error = %e, "Guardrail validator failed; treating as rejection");
            GuardrailCheck {
                guardrail: name,
                passed: false,
                message: Some(format!("validator error: {}", e)),
                category: Some(FailureCategory::Other),
                errored: true,
            }
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(guardrail = %name, panic = %message, "Guardrail validator panicked; treating as rejection");
            GuardrailCheck {
                guardrail: name,
                passed: false,
                message: Some(format!("validator panicked: {}", message)),
                category: Some(FailureCategory::Other),
                errored: true,
            }
        }
    }
}
