//! The language-model capability the engine drives.
//!
//! The engine never talks to a provider itself; it calls [`Model::generate`]
//! once per turn and reacts to the [`ModelResponse`](crate::types::ModelResponse).

mod request;
mod scripted;

use async_trait::async_trait;

pub use request::{GenerateRequest, GenerationSettings};
pub use scripted::ScriptedModel;

use crate::types::ModelResponse;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("scripted model has no responses left (call {call})")]
    ScriptExhausted { call: usize },
}

impl ModelError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

#[async_trait]
pub trait Model: Send + Sync {
    /// Short identifier used in logs and spans.
    fn name(&self) -> &str {
        "model"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ModelError>;
}
