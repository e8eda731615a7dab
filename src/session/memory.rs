use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Session, SessionResult};
use crate::types::Message;

/// In-memory session (for testing and single-instance deployments).
///
/// Clones share the same history.
#[derive(Debug, Clone)]
pub struct MemorySession {
    id: String,
    messages: Arc<RwLock<Vec<Message>>>,
}

impl MemorySession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Arc::default(),
        }
    }

    /// Session with a fresh random id.
    pub fn ephemeral() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_history(id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: id.into(),
            messages: Arc::new(RwLock::new(messages)),
        }
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn history(&self) -> SessionResult<Vec<Message>> {
        Ok(self.messages.read().await.clone())
    }

    async fn add_messages(&self, messages: &[Message]) -> SessionResult<()> {
        self.messages.write().await.extend_from_slice(messages);
        Ok(())
    }

    async fn clear(&self) -> SessionResult<()> {
        self.messages.write().await.clear();
        Ok(())
    }
}
