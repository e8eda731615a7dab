use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerateRequest, Model, ModelError};
use crate::types::ModelResponse;

type Reply = Result<ModelResponse, ModelError>;

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    last: Option<Reply>,
    requests: Vec<GenerateRequest>,
}

/// Deterministic [`Model`] that replays queued responses in order and
/// records every request it receives.
///
/// Useful for tests and offline demos: the engine behaves exactly as it
/// would against a real provider returning the same responses.
#[derive(Default)]
pub struct ScriptedModel {
    name: String,
    repeat_last: bool,
    script: Mutex<Script>,
}

impl ScriptedModel {
    pub fn new(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        let model = Self {
            name: "scripted".to_string(),
            ..Default::default()
        };
        for response in responses {
            model.push(response);
        }
        model
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Keep returning the final reply once the queue is drained.
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    pub fn push(&self, response: ModelResponse) {
        self.lock().replies.push_back(Ok(response));
    }

    pub fn push_error(&self, error: ModelError) {
        self.lock().replies.push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.lock().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn remaining(&self) -> usize {
        self.lock().replies.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("name", &self.name)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[async_trait]
impl Model for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ModelError> {
        let mut script = self.lock();
        script.requests.push(request);
        let call = script.requests.len();

        match script.replies.pop_front() {
            Some(reply) => {
                if self.repeat_last {
                    script.last = Some(reply.clone());
                }
                reply
            }
            None => match &script.last {
                Some(reply) => reply.clone(),
                None => Err(ModelError::ScriptExhausted { call }),
            },
        }
    }
}
