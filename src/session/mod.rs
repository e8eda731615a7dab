//! Conversation history stores.
//!
//! The runner loads history once before the first turn and persists the
//! run's messages once after it produces a final output. It never touches
//! the store mid-run.

mod memory;

use async_trait::async_trait;

pub use memory::MemorySession;

use crate::types::Message;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {id}")]
    NotFound { id: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[async_trait]
pub trait Session: Send + Sync {
    fn id(&self) -> &str;

    async fn history(&self) -> SessionResult<Vec<Message>>;

    async fn add_messages(&self, messages: &[Message]) -> SessionResult<()>;

    async fn clear(&self) -> SessionResult<()>;
}
