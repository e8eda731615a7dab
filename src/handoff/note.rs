use serde::{Deserialize, Serialize};

/// System note prepended to the receiving agent's instructions for
/// exactly one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferNote {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl TransferNote {
    pub fn render(&self) -> String {
        let mut note = format!("Transferred from {} to {}", self.from, self.to);
        match &self.reason {
            Some(reason) => {
                note.push_str(" because ");
                note.push_str(reason.trim_end_matches('.'));
                note.push('.');
            }
            None => note.push('.'),
        }
        if let Some(context) = &self.context {
            note.push_str(" Context: ");
            note.push_str(context);
        }
        note
    }

    /// Instructions for the receiving agent's first turn.
    pub fn prepend_to(&self, instructions: &str) -> String {
        if instructions.is_empty() {
            self.render()
        } else {
            format!("{}\n\n{}", self.render(), instructions)
        }
    }
}
