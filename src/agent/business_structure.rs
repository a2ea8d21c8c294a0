//! Business structure analysis: business models, organization, scalability.

use super::{ask, Agent};
use crate::llm::{CompletionClient, GenerationParams};
use crate::models::{AgentKind, AgentOutput, IdeaInput};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Token limit for the scalability plan, a single paragraph.
const SCALABILITY_MAX_TOKENS: u32 = 300;

pub struct BusinessStructureAgent {
    client: Arc<dyn CompletionClient>,
    params: GenerationParams,
}

impl BusinessStructureAgent {
    pub fn new(client: Arc<dyn CompletionClient>, params: GenerationParams) -> Self {
        Self { client, params }
    }
}

pub(crate) fn business_models_prompt(industry: &str, business_model_type: &str) -> String {
    format!(
        "Propose suitable business models for a startup in the {} industry using a {} model. \
         Provide the models as a JSON array of strings. Return only the json object nothing else",
        industry, business_model_type
    )
}

pub(crate) fn org_structure_prompt(company_size: &str) -> String {
    format!(
        "Map an organizational structure for a company of size '{}'. Provide the structure as \
         a JSON object where keys are roles and values are their responsibilities. Return only \
         the json object nothing else",
        company_size
    )
}

pub(crate) fn scalability_prompt(business_model_type: &str, structure: &str) -> String {
    format!(
        "Plan scalability strategies for a business using the '{}' model and the following \
         organizational structure:\n\n '{}' \n\n Provide the scalability plan as a detailed \
         paragraph.",
        business_model_type, structure
    )
}

#[async_trait]
impl Agent for BusinessStructureAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::BusinessStructure
    }

    async fn process(&self, input: &IdeaInput) -> AgentOutput {
        info!("Starting business structure analysis.");
        let client = self.client.as_ref();
        let model_type = input.business_model_type();

        let models = ask(
            client,
            "Proposed Business Models",
            &business_models_prompt(input.industry(), model_type),
            self.params,
            "Unable to propose business models at this time.",
        )
        .await;

        let structure = ask(
            client,
            "Organizational Structure",
            &org_structure_prompt(input.company_size()),
            self.params,
            "Unable to map organizational structure at this time.",
        )
        .await;

        let scalability = ask(
            client,
            "Scalability Plan",
            &scalability_prompt(model_type, &structure.raw),
            self.params.with_max_tokens(SCALABILITY_MAX_TOKENS),
            "Unable to plan scalability at this time.",
        )
        .await;

        info!("Business structure analysis completed successfully.");
        AgentOutput::new(
            AgentKind::BusinessStructure,
            vec![models.section, structure.section, scalability.section],
        )
    }
}
