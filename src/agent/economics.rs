//! Economic analysis: market data, financial projections, competition.

use super::{ask, Agent};
use crate::llm::{CompletionClient, GenerationParams};
use crate::models::{AgentKind, AgentOutput, IdeaInput};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct EconomicsAgent {
    client: Arc<dyn CompletionClient>,
    params: GenerationParams,
}

impl EconomicsAgent {
    pub fn new(client: Arc<dyn CompletionClient>, params: GenerationParams) -> Self {
        Self { client, params }
    }
}

pub(crate) fn market_data_prompt(industry: &str) -> String {
    format!(
        "Provide a detailed overview of the market for the {} industry. Include current market \
         size, projected growth rates, key trends, and major players. Format the response as a \
         JSON object with the following keys: 'market_size', 'growth_rate', 'key_trends', \
         'major_players'. Return only the json object nothing else",
        industry
    )
}

pub(crate) fn projections_prompt(business_model: &str) -> String {
    format!(
        "Generate a three-year financial projection for a startup using the '{}' business \
         model. Include projected revenues, expenses, and profits for each year. Format the \
         response as a JSON object with years as keys and sub-keys 'Revenue', 'Expenses', and \
         'Profit'. Return only the json object nothing else",
        business_model
    )
}

pub(crate) fn competition_prompt(industry: &str) -> String {
    format!(
        "Conduct a competitive analysis for the {} industry. Identify 3 key competitors, their \
         market shares, strengths, and weaknesses. Format the response as a JSON array of \
         objects, each containing 'Name', 'Market Share', 'Strengths', and 'Weaknesses'. \
         Return only the json object nothing else",
        industry
    )
}

#[async_trait]
impl Agent for EconomicsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Economics
    }

    async fn process(&self, input: &IdeaInput) -> AgentOutput {
        info!("Starting economic analysis.");
        let client = self.client.as_ref();
        let industry = input.industry();

        let market = ask(
            client,
            "Market Data",
            &market_data_prompt(industry),
            self.params,
            "Unable to fetch market data at this time.",
        )
        .await;

        let projections = ask(
            client,
            "Financial Projections",
            &projections_prompt(input.business_model()),
            self.params,
            "Unable to generate financial projections at this time.",
        )
        .await;

        let competition = ask(
            client,
            "Competitive Analysis",
            &competition_prompt(industry),
            self.params,
            "Unable to conduct competitive analysis at this time.",
        )
        .await;

        info!("Economic analysis completed successfully.");
        AgentOutput::new(
            AgentKind::Economics,
            vec![market.section, projections.section, competition.section],
        )
    }
}
