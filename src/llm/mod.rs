//! Completion client abstraction.
//!
//! Every model call in the crate goes through [`CompletionClient`]. The
//! production implementation streams from an OpenAI-compatible endpoint;
//! [`Retrying`] wraps any client with a bounded retry.

pub mod groq;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use groq::{ClientSettings, GroqClient};
pub use retry::{RetryPolicy, Retrying};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged message sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Generation parameters for a single call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

impl GenerationParams {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
        }
    }

    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        Self { max_tokens, ..self }
    }

    pub fn validate(&self) -> Result<(), CompletionError> {
        if self.max_tokens == 0 {
            return Err(CompletionError::InvalidRequest(
                "max_tokens must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(CompletionError::InvalidRequest(format!(
                "temperature {} is outside 0.0..=1.0",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Failure of a completion call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompletionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication rejected ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("model returned an empty response")]
    EmptyResponse,
}

impl CompletionError {
    /// Whether a second attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Timeout(_)
            | CompletionError::Connect(_)
            | CompletionError::Transport(_) => true,
            CompletionError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A remote language model.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a full conversation and return the trimmed reply.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, CompletionError>;

    /// Send a single user prompt.
    async fn complete(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, CompletionError> {
        if prompt.trim().is_empty() {
            return Err(CompletionError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        params.validate()?;
        self.chat(&[ChatMessage::user(prompt)], params).await
    }

    /// Model identifier, for reporting.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedClient;
    use super::*;

    #[test]
    fn test_params_validation() {
        assert!(GenerationParams::default().validate().is_ok());
        assert!(GenerationParams::new(0, 0.5).validate().is_err());
        assert!(GenerationParams::new(100, 1.5).validate().is_err());
        assert!(GenerationParams::new(100, -0.1).validate().is_err());
        assert!(GenerationParams::new(100, 0.0).validate().is_ok());
    }

    #[test]
    fn test_transient_classification() {
        assert!(CompletionError::Timeout(30).is_transient());
        assert!(CompletionError::Connect("x".into()).is_transient());
        assert!(CompletionError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(CompletionError::Status {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!CompletionError::Status {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!CompletionError::Auth {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!CompletionError::EmptyResponse.is_transient());
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_prompt_without_calling() {
        let client = ScriptedClient::echo();
        let err = client
            .complete("   ", GenerationParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::InvalidRequest(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_complete_wraps_prompt_as_user_message() {
        let client = ScriptedClient::echo();
        let reply = client
            .complete("hello", GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(reply, "hello");
        assert_eq!(client.calls()[0], vec![ChatMessage::user("hello")]);
    }
}
