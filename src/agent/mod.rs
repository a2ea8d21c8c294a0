//! Analyst agents.
//!
//! Each agent turns the idea's input fields into a handful of prompts,
//! issues them in order, and collects the replies as labeled sections.
//! A failed completion never fails the agent: the section gets a fixed
//! placeholder and is marked as a fallback.

pub mod business_structure;
pub mod economics;
pub mod legal;

pub use business_structure::BusinessStructureAgent;
pub use economics::EconomicsAgent;
pub use legal::LegalAgent;

use crate::llm::{CompletionClient, GenerationParams};
use crate::models::{AgentKind, AgentOutput, IdeaInput, Section};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// An analyst that produces one stored output per idea.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Run every prompt for `input`. Never fails; see [`AgentOutput::is_degraded`].
    async fn process(&self, input: &IdeaInput) -> AgentOutput;
}

/// Build the analyst agents in pipeline order, asking `client_for` for
/// each agent's client.
pub fn analysts<F, E>(mut client_for: F, params: GenerationParams) -> Result<Vec<Box<dyn Agent>>, E>
where
    F: FnMut(AgentKind) -> Result<Arc<dyn CompletionClient>, E>,
{
    let mut agents: Vec<Box<dyn Agent>> = Vec::with_capacity(AgentKind::ANALYSTS.len());
    for kind in AgentKind::ANALYSTS {
        let client = client_for(kind)?;
        if let Some(agent) = analyst(kind, client, params) {
            agents.push(agent);
        }
    }
    Ok(agents)
}

/// The analyst for `kind`. The report is built by the aggregator, not an analyst.
fn analyst(
    kind: AgentKind,
    client: Arc<dyn CompletionClient>,
    params: GenerationParams,
) -> Option<Box<dyn Agent>> {
    match kind {
        AgentKind::Legal => Some(Box::new(LegalAgent::new(client, params))),
        AgentKind::Economics => Some(Box::new(EconomicsAgent::new(client, params))),
        AgentKind::BusinessStructure => {
            Some(Box::new(BusinessStructureAgent::new(client, params)))
        }
        AgentKind::ComprehensiveReport => None,
    }
}

/// A completed prompt.
pub(crate) struct Answer {
    /// Model text as returned, or the fallback text. Later prompts embed this.
    pub raw: String,
    pub section: Section,
}

/// Issue one prompt and turn the result into a section.
pub(crate) async fn ask(
    client: &dyn CompletionClient,
    title: &str,
    prompt: &str,
    params: GenerationParams,
    fallback: &str,
) -> Answer {
    match client.complete(prompt, params).await {
        Ok(text) => {
            debug!("{}: received {} bytes", title, text.len());
            Answer {
                section: Section::generated(title, render_structured(&text)),
                raw: text,
            }
        }
        Err(e) => {
            warn!("{} prompt failed: {}", title, e);
            Answer {
                raw: fallback.to_string(),
                section: Section::fallback(title, fallback),
            }
        }
    }
}

/// Render model output as Markdown.
///
/// Replies are asked to be JSON. When one parses, arrays become numbered
/// lists and objects become bullet lists; anything else is returned as is.
pub fn render_structured(text: &str) -> String {
    let trimmed = text.trim();
    let candidate = strip_code_fence(trimmed);

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {}", i + 1, inline(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(Value::Object(fields)) if !fields.is_empty() => fields
            .iter()
            .map(|(key, value)| format!("- **{}**: {}", key, inline(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => trimmed.to_string(),
    }
}

/// Drop a surrounding ```json fence if the whole reply is wrapped in one.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Skip the info string on the opening line
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => body.trim(),
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(inline).collect::<Vec<_>>().join(", "),
        Value::Object(fields) => fields
            .iter()
            .map(|(k, v)| format!("{}: {}", k, inline(v)))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => "N/A".to_string(),
        other => other.to_string(),
    }
}
