//! Legal analysis: regulations, compliance checklist, legal risks.

use super::{ask, Agent};
use crate::llm::{CompletionClient, GenerationParams};
use crate::models::{AgentKind, AgentOutput, IdeaInput};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct LegalAgent {
    client: Arc<dyn CompletionClient>,
    params: GenerationParams,
}

impl LegalAgent {
    pub fn new(client: Arc<dyn CompletionClient>, params: GenerationParams) -> Self {
        Self { client, params }
    }
}

pub(crate) fn regulations_prompt(industry: &str) -> String {
    format!(
        "Provide a detailed overview of the regulations applicable to the {} industry. \
         Include data protection laws, licensing requirements, compliance standards, and any \
         other relevant regulations. Format the response as a JSON object with the following \
         keys: 'data_protection_laws', 'licensing_requirements', 'compliance_standards', \
         'other_regulations'. Return only the json object nothing else",
        industry
    )
}

pub(crate) fn checklist_prompt(regulations: &str) -> String {
    format!(
        "Based on the following regulations, generate a detailed compliance checklist for a \
         startup in the industry.\n\n '{}' \n\n Provide the checklist as a JSON array of \
         strings. Return only the json object nothing else",
        regulations
    )
}

pub(crate) fn risks_prompt(business_model: &str) -> String {
    format!(
        "Assess the potential legal risks associated with the '{}' business model. Consider \
         aspects such as data privacy, intellectual property, contractual obligations, and \
         regulatory compliance. Format the response as a JSON array of strings. Return only \
         the json object nothing else",
        business_model
    )
}

#[async_trait]
impl Agent for LegalAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Legal
    }

    async fn process(&self, input: &IdeaInput) -> AgentOutput {
        info!("Starting legal analysis.");
        let client = self.client.as_ref();

        let regulations = ask(
            client,
            "Regulations",
            &regulations_prompt(input.industry()),
            self.params,
            "Unable to fetch regulations at this time.",
        )
        .await;

        let checklist = ask(
            client,
            "Compliance Checklist",
            &checklist_prompt(&regulations.raw),
            self.params,
            "Unable to generate compliance checklist at this time.",
        )
        .await;

        let risks = ask(
            client,
            "Legal Risks",
            &risks_prompt(input.business_model()),
            self.params,
            "Unable to assess legal risks at this time.",
        )
        .await;

        info!("Legal analysis completed successfully.");
        AgentOutput::new(
            AgentKind::Legal,
            vec![regulations.section, checklist.section, risks.section],
        )
    }
}
