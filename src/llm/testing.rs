//! In-process completion clients for tests.

use super::{ChatMessage, CompletionClient, CompletionError, GenerationParams};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Replays queued responses, then echoes the last message once the queue runs dry.
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, CompletionError>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub(crate) fn new(responses: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub(crate) fn echo() -> Self {
        Self::new(Vec::new())
    }

    /// Fails every call with the given error.
    pub(crate) fn failing(error: CompletionError, calls: usize) -> Self {
        Self::new(vec![Err(error); calls])
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The last message of every call, in order.
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|messages| messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _params: GenerationParams,
    ) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(messages.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.responses.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => Ok(messages
                .last()
                .map(|m| m.content.trim().to_string())
                .unwrap_or_default()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
