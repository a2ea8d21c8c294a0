//! Aggregation of agent outputs into the comprehensive report.
//!
//! Two completions: one summarizes the stored analyses into a Markdown
//! report, the second polishes that summary. A failed summary yields a
//! fixed placeholder; a failed polish keeps the unpolished summary.

use crate::llm::{CompletionClient, GenerationParams};
use crate::models::{AgentKind, ComprehensiveReport, IdeaRecord, Provenance};
use crate::storage::{to_pretty_json, RecordStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Placeholder used when the summary completion fails.
pub const SUMMARY_FALLBACK: &str = "Unable to summarize data at this time.";

const POLISH_MAX_TOKENS: u32 = 500;

pub struct Aggregator {
    client: Arc<dyn CompletionClient>,
    params: GenerationParams,
}

impl Aggregator {
    pub fn new(client: Arc<dyn CompletionClient>, params: GenerationParams) -> Self {
        Self { client, params }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Aggregate whatever is stored for `idea_id`.
    pub async fn process(&self, store: &dyn RecordStore, idea_id: &str) -> ComprehensiveReport {
        let record = store.retrieve_outputs(idea_id);
        info!("Aggregated data for idea_id: {}", idea_id);
        self.process_outputs(&record).await
    }

    /// Aggregate the given analyses.
    ///
    /// Report fields are left out so an earlier report is never summarized
    /// into the next one.
    pub async fn process_outputs(&self, record: &IdeaRecord) -> ComprehensiveReport {
        info!("Starting report generation.");

        let analyses = analyses_only(record);
        debug!(
            "Summarizing {} analyses: {:?}",
            analyses.len(),
            analyses.keys().collect::<Vec<_>>()
        );

        let summary = match self
            .client
            .complete(&summary_prompt(&analyses), self.params)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Summary prompt failed: {}", e);
                return ComprehensiveReport {
                    text: SUMMARY_FALLBACK.to_string(),
                    summary: Provenance::Fallback,
                    polish: Provenance::Fallback,
                };
            }
        };

        let polish_params = self.params.with_max_tokens(POLISH_MAX_TOKENS);
        let report = match self
            .client
            .complete(&polish_prompt(&summary), polish_params)
            .await
        {
            Ok(text) => ComprehensiveReport {
                text,
                summary: Provenance::Generated,
                polish: Provenance::Generated,
            },
            Err(e) => {
                warn!("Polish prompt failed, keeping the unpolished summary: {}", e);
                ComprehensiveReport {
                    text: summary,
                    summary: Provenance::Generated,
                    polish: Provenance::Fallback,
                }
            }
        };

        info!("Report generation completed successfully.");
        report
    }
}

fn analyses_only(record: &IdeaRecord) -> IdeaRecord {
    record
        .iter()
        .filter(|(key, _)| !AgentKind::is_report_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub(crate) fn summary_prompt(analyses: &IdeaRecord) -> String {
    let json = to_pretty_json(analyses).unwrap_or_else(|_| format!("{:?}", analyses));
    format!(
        "Generate a comprehensive and cohesive report based on the following aggregated \
         data:\n\n '{}'\n\n The report should include sections for Legal Analysis, Economic \
         Analysis, and Business Structure Analysis. Each section should be well-formatted in \
         Markdown with appropriate headings and subheadings.",
        json
    )
}

pub(crate) fn polish_prompt(summary: &str) -> String {
    format!(
        "Format the following summary into a polished Markdown report:\n\n {}\n\n Ensure that \
         the report has a clear structure, with appropriate headings, subheadings, and \
         formatting.",
        summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::llm::CompletionError;
    use crate::storage::MemoryStore;

    fn record(pairs: &[(&str, &str)]) -> IdeaRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_partial_record_still_produces_report() {
        let store = MemoryStore::new();
        store.store_output("Legal", "L", "test1");
        store.store_output("Economics", "E", "test1");

        let client = Arc::new(ScriptedClient::new(vec![
            Ok("## Summary".to_string()),
            Ok("# Polished".to_string()),
        ]));
        let aggregator = Aggregator::new(client.clone(), GenerationParams::default());

        let report = aggregator.process(&store, "test1").await;

        assert_eq!(report.text, "# Polished");
        assert!(!report.is_degraded());
        let prompts = client.prompts();
        assert!(prompts[0].contains("\"Legal\": \"L\""));
        assert!(prompts[0].contains("\"Economics\": \"E\""));
        assert!(prompts[1].contains("## Summary"));
    }

    #[tokio::test]
    async fn test_echo_client_keeps_every_analysis() {
        let store = MemoryStore::new();
        store.store_output("Legal", "X", "id1");
        store.store_output("Economics", "Y", "id1");
        store.store_output("BusinessStructure", "Z", "id1");

        let aggregator = Aggregator::new(Arc::new(ScriptedClient::echo()), GenerationParams::default());
        let report = aggregator.process(&store, "id1").await;

        for value in ["\"X\"", "\"Y\"", "\"Z\""] {
            assert!(report.text.contains(value), "missing {}", value);
        }
    }

    #[tokio::test]
    async fn test_polish_failure_keeps_summary() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("raw summary".to_string()),
            Err(CompletionError::Timeout(120)),
        ]));
        let aggregator = Aggregator::new(client, GenerationParams::default());

        let report = aggregator
            .process_outputs(&record(&[("Legal", "L")]))
            .await;

        assert_eq!(report.text, "raw summary");
        assert_eq!(report.summary, Provenance::Generated);
        assert_eq!(report.polish, Provenance::Fallback);
    }

    #[tokio::test]
    async fn test_summary_failure_skips_polish() {
        let client = Arc::new(ScriptedClient::failing(
            CompletionError::Auth {
                status: 401,
                body: "bad key".to_string(),
            },
            2,
        ));
        let aggregator = Aggregator::new(client.clone(), GenerationParams::default());

        let report = aggregator.process_outputs(&IdeaRecord::new()).await;

        assert_eq!(report.text, SUMMARY_FALLBACK);
        assert!(report.is_degraded());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_report_fields_are_not_summarized() {
        let client = Arc::new(ScriptedClient::echo());
        let aggregator = Aggregator::new(client.clone(), GenerationParams::default());

        aggregator
            .process_outputs(&record(&[
                ("Legal", "fresh legal"),
                ("ComprehensiveReport", "stale report"),
                ("report", "legacy report"),
            ]))
            .await;

        let summary_prompt = &client.prompts()[0];
        assert!(summary_prompt.contains("fresh legal"));
        assert!(!summary_prompt.contains("stale report"));
        assert!(!summary_prompt.contains("legacy report"));
    }

    #[test]
    fn test_missing_idea_aggregates_empty_record() {
        let store = MemoryStore::new();
        let client = Arc::new(ScriptedClient::echo());
        let aggregator = Aggregator::new(client.clone(), GenerationParams::default());

        let report = tokio_test::block_on(aggregator.process(&store, "nothing_here"));

        assert!(!report.text.is_empty());
        assert!(client.prompts()[0].contains("'{}'"));
    }
}
