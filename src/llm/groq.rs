//! Streaming client for OpenAI-compatible chat completion endpoints.
//!
//! Requests are sent with `stream: true`; the response is a server-sent event
//! stream whose `choices[0].delta.content` fragments are concatenated into
//! the final reply.

use super::{ChatMessage, CompletionClient, CompletionError, GenerationParams};
use crate::config::{resolve_credential, ConfigError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for one client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL, e.g. `https://api.groq.com/openai/v1`.
    pub api_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

/// Chat completion request body.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

/// Client for Groq (or any OpenAI-compatible) completions.
pub struct GroqClient {
    settings: ClientSettings,
    api_key: String,
    http_client: reqwest::Client,
}

impl GroqClient {
    pub fn new(settings: ClientSettings, api_key: String) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        info!(
            "Initializing completion client for model {} at {}",
            settings.model, settings.api_url
        );

        Ok(Self {
            settings,
            api_key,
            http_client,
        })
    }

    /// Create a client whose credential is read from `api_key_env`.
    pub fn from_env(settings: ClientSettings, api_key_env: &str) -> Result<Self, ConfigError> {
        let api_key = resolve_credential(api_key_env)?;
        Self::new(settings, api_key)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_url.trim_end_matches('/')
        )
    }

    fn map_transport_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.settings.timeout_seconds)
        } else if e.is_connect() {
            CompletionError::Connect(self.settings.api_url.clone())
        } else {
            CompletionError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, CompletionError> {
        if messages.is_empty() {
            return Err(CompletionError::InvalidRequest(
                "at least one message is required".to_string(),
            ));
        }
        params.validate()?;

        let request = ChatCompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: 1.0,
            stream: true,
        };

        debug!(
            "Sending completion request with {} messages to {}",
            messages.len(),
            self.settings.model
        );

        let mut response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = status.as_u16();
            return Err(if code == 401 || code == 403 {
                CompletionError::Auth { status: code, body }
            } else {
                CompletionError::Status { status: code, body }
            });
        }

        let mut stream = SseAccumulator::default();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_transport_error(e))?
        {
            stream.push(&chunk)?;
            if stream.is_done() {
                break;
            }
        }

        stream.finish()
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

/// Incremental parser for a chat completion event stream.
///
/// Bytes are buffered until a full line is available so multi-byte
/// characters split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseAccumulator {
    buffer: Vec<u8>,
    text: String,
    done: bool,
}

impl SseAccumulator {
    /// Feed raw bytes from the response body.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), CompletionError> {
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.handle_line(&line)?;
            if self.done {
                break;
            }
        }

        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Flush any trailing line and return the trimmed text.
    pub fn finish(mut self) -> Result<String, CompletionError> {
        if !self.done && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.handle_line(&line)?;
        }

        let text = self.text.trim();
        if text.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    fn handle_line(&mut self, line: &str) -> Result<(), CompletionError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() || line.starts_with(':') {
            return Ok(());
        }

        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let event: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping unparseable stream frame: {}", e);
                return Ok(());
            }
        };

        if let Some(error) = event.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(CompletionError::Malformed(message));
        }

        if let Some(fragment) = event
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
        {
            self.text.push_str(fragment);
        }

        Ok(())
    }
}
