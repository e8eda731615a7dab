//! Agent-to-agent transfers.
//!
//! Every sub-agent contributes one reserved tool, `transfer_to_<name>`.
//! When the model calls it, the runner switches to that agent and resets
//! the history to the original user input plus a one-turn transfer note.

mod chain;
mod detect;
mod note;

pub use chain::HandoffChain;
pub use detect::{TransferDetection, TransferRequest, detect_transfer};
pub use note::TransferNote;

use serde_json::json;

use crate::agent::Agent;
use crate::types::ToolDefinition;

pub const TRANSFER_PREFIX: &str = "transfer_to_";

/// `"Billing Team"` becomes `"transfer_to_billing_team"`.
pub fn transfer_tool_name(agent_name: &str) -> String {
    let slug = agent_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    format!("{}{}", TRANSFER_PREFIX, slug)
}

pub fn transfer_tool_definition(agent: &Agent) -> ToolDefinition {
    let mut description = format!("Transfer the conversation to the {} agent.", agent.name());
    if let Some(handoff) = agent.handoff_description() {
        description.push(' ');
        description.push_str(handoff);
    }
    ToolDefinition::new(
        transfer_tool_name(agent.name()),
        description,
        json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Why the conversation is being transferred"
                },
                "context": {
                    "type": "string",
                    "description": "Optional notes for the receiving agent"
                }
            },
            "required": ["reason"]
        }),
    )
}

pub fn is_transfer_call(tool_name: &str) -> bool {
    tool_name
        .get(..TRANSFER_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(TRANSFER_PREFIX))
}

/// Case-insensitive, whitespace and underscore insensitive form of a name.
pub fn normalize_agent_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
