//! The analysis pipeline.
//!
//! Runs Legal, Economics and BusinessStructure in that order, stores each
//! rendered output under its agent key, aggregates the three outputs into
//! the comprehensive report, stores it, and reads it back from the store.

use crate::agent::Agent;
use crate::analysis::Aggregator;
use crate::models::{
    AgentKind, AgentOutput, ComprehensiveReport, IdeaInput, IdeaRecord, Provenance, RunMetadata,
    RunReport, SectionStatus, StageSummary,
};
use crate::storage::RecordStore;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Text returned when the stored report cannot be read back.
pub const REPORT_NOT_FOUND: &str = "No report found.";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Deadline for each stage, covering all of its completions.
    pub stage_timeout: Duration,
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(900),
            show_progress: false,
        }
    }
}

pub struct Pipeline<'a> {
    analysts: Vec<Box<dyn Agent>>,
    aggregator: Aggregator,
    store: &'a dyn RecordStore,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        analysts: Vec<Box<dyn Agent>>,
        aggregator: Aggregator,
        store: &'a dyn RecordStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            analysts,
            aggregator,
            store,
            options,
        }
    }

    /// Run every stage for `idea_id`.
    pub async fn run(&self, idea_id: &str, input: &IdeaInput) -> RunReport {
        let started = Instant::now();
        let run_date = Utc::now();
        info!("Starting pipeline for idea_id: {}", idea_id);

        let mut outputs = IdeaRecord::new();
        let mut stages = Vec::with_capacity(self.analysts.len() + 1);

        for agent in &self.analysts {
            let output = self.run_analyst(agent.as_ref(), input).await;
            let text = output.render();
            self.store.store_output(output.agent.key(), &text, idea_id);
            outputs.insert(output.agent.key().to_string(), text);
            stages.push(StageSummary::from(&output));
        }

        let (report, timed_out) = self.run_aggregator(&outputs).await;
        let report_key = AgentKind::ComprehensiveReport.key();
        self.store.store_output(report_key, &report.text, idea_id);
        stages.push(report_stage(&report, timed_out));

        let stored = self
            .store
            .retrieve_outputs(idea_id)
            .remove(report_key)
            .unwrap_or_else(|| {
                error!("Report for idea_id {} missing after store", idea_id);
                REPORT_NOT_FOUND.to_string()
            });

        let duration = started.elapsed().as_secs_f64();
        info!("Pipeline finished for idea_id {} in {:.1}s", idea_id, duration);

        RunReport {
            metadata: RunMetadata {
                idea_id: idea_id.to_string(),
                run_date,
                model_used: self.aggregator.model_name().to_string(),
                duration_seconds: duration,
            },
            input: input.clone(),
            stages,
            report: stored,
        }
    }

    async fn run_analyst(&self, agent: &dyn Agent, input: &IdeaInput) -> AgentOutput {
        let kind = agent.kind();
        let spinner = self.spinner(kind);

        let output = match tokio::time::timeout(self.options.stage_timeout, agent.process(input))
            .await
        {
            Ok(output) => output,
            Err(_) => {
                warn!(
                    "{} exceeded the {}s stage deadline",
                    kind.label(),
                    self.options.stage_timeout.as_secs()
                );
                AgentOutput::failed(kind)
            }
        };

        let fallbacks = output.fallback_titles();
        if !fallbacks.is_empty() {
            warn!(
                "{} used placeholder text for: {}",
                kind.label(),
                fallbacks.join(", ")
            );
        }

        if let Some(pb) = spinner {
            let status = if output.is_degraded() {
                Provenance::Fallback
            } else {
                Provenance::Generated
            };
            pb.finish_with_message(format!("{} {}", status.emoji(), kind.label()));
        }

        output
    }

    /// Build the report. The flag is set when the stage deadline expired.
    async fn run_aggregator(&self, outputs: &IdeaRecord) -> (ComprehensiveReport, bool) {
        let kind = AgentKind::ComprehensiveReport;
        let spinner = self.spinner(kind);

        let (report, timed_out) = match tokio::time::timeout(
            self.options.stage_timeout,
            self.aggregator.process_outputs(outputs),
        )
        .await
        {
            Ok(report) => (report, false),
            Err(_) => {
                warn!("Report generation exceeded the stage deadline");
                let report = ComprehensiveReport {
                    text: kind.error_message().to_string(),
                    summary: Provenance::Fallback,
                    polish: Provenance::Fallback,
                };
                (report, true)
            }
        };

        if let Some(pb) = spinner {
            let status = if report.is_degraded() {
                Provenance::Fallback
            } else {
                Provenance::Generated
            };
            pb.finish_with_message(format!("{} {}", status.emoji(), kind.label()));
        }

        (report, timed_out)
    }

    fn spinner(&self, kind: AgentKind) -> Option<ProgressBar> {
        if !self.options.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Running {}...", kind.label()));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

fn report_stage(report: &ComprehensiveReport, timed_out: bool) -> StageSummary {
    StageSummary {
        agent: AgentKind::ComprehensiveReport,
        sections: vec![
            SectionStatus {
                title: "Summary".to_string(),
                provenance: report.summary,
            },
            SectionStatus {
                title: "Polish".to_string(),
                provenance: report.polish,
            },
        ],
        error: timed_out.then(|| report.text.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{self, LegalAgent};
    use crate::llm::testing::ScriptedClient;
    use crate::llm::{CompletionClient, CompletionError, GenerationParams};
    use crate::storage::{MemoryStore, StoreError};
    use std::sync::Arc;

    fn pipeline<'a>(
        client: Arc<dyn CompletionClient>,
        store: &'a dyn RecordStore,
        options: PipelineOptions,
    ) -> Pipeline<'a> {
        let params = GenerationParams::default();
        let analysts =
            agent::analysts::<_, ()>(|_| Ok(client.clone()), params).unwrap();
        Pipeline::new(analysts, Aggregator::new(client, params), store, options)
    }

    #[tokio::test]
    async fn test_run_stores_every_stage() {
        let store = MemoryStore::new();
        let client: Arc<dyn CompletionClient> = Arc::new(ScriptedClient::echo());
        let input = IdeaInput::new().with(IdeaInput::INDUSTRY, "Technology");

        let run = pipeline(client, &store, PipelineOptions::default())
            .run("idea_007", &input)
            .await;

        let record = store.retrieve_outputs("idea_007");
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["BusinessStructure", "ComprehensiveReport", "Economics", "Legal"]
        );
        assert!(record["Legal"].starts_with("**Regulations:**"));
        assert!(record["Economics"].contains("Technology industry"));
        assert_eq!(run.report, record["ComprehensiveReport"]);
        assert_eq!(run.stages.len(), 4);
        assert_eq!(run.fallback_count(), 0);
        assert_eq!(run.metadata.idea_id, "idea_007");
        assert_eq!(run.metadata.model_used, "scripted");
    }

    #[tokio::test]
    async fn test_report_summarizes_fresh_outputs() {
        let store = MemoryStore::new();
        store.store_output("ComprehensiveReport", "old report", "idea_1");
        let client: Arc<dyn CompletionClient> = Arc::new(ScriptedClient::echo());

        let run = pipeline(client, &store, PipelineOptions::default())
            .run("idea_1", &IdeaInput::new())
            .await;

        assert!(run.report.contains("Legal"));
        assert!(!run.report.contains("old report"));
    }

    #[tokio::test]
    async fn test_failing_client_still_completes() {
        let store = MemoryStore::new();
        let client: Arc<dyn CompletionClient> = Arc::new(ScriptedClient::failing(
            CompletionError::Connect("refused".to_string()),
            20,
        ));

        let run = pipeline(client, &store, PipelineOptions::default())
            .run("idea_1", &IdeaInput::new())
            .await;

        assert_eq!(run.report, "Unable to summarize data at this time.");
        assert!(store.retrieve_outputs("idea_1")["Legal"]
            .contains("Unable to fetch regulations at this time."));
        // Nine sections plus summary and polish
        assert_eq!(run.fallback_count(), 11);
    }

    #[tokio::test]
    async fn test_stage_deadline_substitutes_error_message() {
        let store = MemoryStore::new();
        let slow: Arc<dyn CompletionClient> =
            Arc::new(ScriptedClient::echo().with_delay(Duration::from_millis(500)));
        let options = PipelineOptions {
            stage_timeout: Duration::from_millis(20),
            show_progress: false,
        };

        let run = pipeline(slow, &store, options)
            .run("idea_slow", &IdeaInput::new())
            .await;

        let record = store.retrieve_outputs("idea_slow");
        assert_eq!(record["Legal"], "An error occurred during legal analysis.");
        assert_eq!(record["Economics"], "An error occurred during economic analysis.");
        assert_eq!(
            record["BusinessStructure"],
            "An error occurred during business structure analysis."
        );
        assert_eq!(run.report, "An error occurred during report generation.");
        assert!(run.stages.iter().all(|s| s.error.is_some()));
    }

    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn try_store_output(&self, _: &str, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }

        fn try_retrieve_outputs(&self, _: &str) -> Result<IdeaRecord, StoreError> {
            Err(StoreError::Poisoned)
        }

        fn try_idea_ids(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    #[tokio::test]
    async fn test_unreadable_store_reports_not_found() {
        let client: Arc<dyn CompletionClient> = Arc::new(ScriptedClient::echo());
        let params = GenerationParams::default();
        let analysts: Vec<Box<dyn Agent>> =
            vec![Box::new(LegalAgent::new(client.clone(), params))];
        let store = BrokenStore;

        let run = Pipeline::new(
            analysts,
            Aggregator::new(client, params),
            &store,
            PipelineOptions::default(),
        )
        .run("idea_1", &IdeaInput::new())
        .await;

        assert_eq!(run.report, REPORT_NOT_FOUND);
        assert_eq!(run.stages.len(), 2);
    }

    #[test]
    fn test_report_stage_error_only_on_deadline() {
        // A model reply can repeat the error text without the stage failing
        let report = ComprehensiveReport {
            text: AgentKind::ComprehensiveReport.error_message().to_string(),
            summary: Provenance::Generated,
            polish: Provenance::Generated,
        };
        assert!(report_stage(&report, false).error.is_none());

        let stage = report_stage(&report, true);
        assert_eq!(
            stage.error.as_deref(),
            Some("An error occurred during report generation.")
        );
        assert_eq!(stage.sections.len(), 2);
    }
}
