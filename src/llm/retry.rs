//! Bounded retry with jittered backoff around any completion client.

use super::{ChatMessage, CompletionClient, CompletionError, GenerationParams};
use crate::config::ModelConfig;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// How many extra attempts to make and how long to wait between them.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first call.
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further one.
    pub base_delay_ms: u64,
    /// Random extra delay as a fraction of the base (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 500,
            jitter_factor: 0.5,
        }
    }
}

impl RetryPolicy {
    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self {
            max_retries: config.retries,
            base_delay_ms: config.retry_delay_ms,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let jitter_range = (base as f64 * self.jitter_factor.clamp(0.0, 1.0)) as u64;
        let jitter = if jitter_range > 0 {
            rand::rng().random_range(0..=jitter_range)
        } else {
            0
        };

        Duration::from_millis(base + jitter)
    }
}

/// Client decorator that retries transient failures.
pub struct Retrying<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: CompletionClient> Retrying<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for Retrying<C> {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, CompletionError> {
        let mut attempt = 0;

        loop {
            match self.inner.chat(messages, params).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Completion attempt {} failed ({}), retrying in {}ms",
                        attempt + 1,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
