//! Data models for the StartupGPT pipeline.
//!
//! This module contains the core data structures shared by the agents,
//! the record store and the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// All stored outputs for one idea, keyed by agent type.
pub type IdeaRecord = BTreeMap<String, String>;

/// Field name of the legacy single-report slot.
pub const LEGACY_REPORT_KEY: &str = "report";

/// The agents whose outputs are stored in an idea record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Regulations, compliance checklist and legal risks.
    Legal,
    /// Market data, financial projections and competitive analysis.
    Economics,
    /// Business models, organizational structure and scalability.
    BusinessStructure,
    /// The aggregated report produced from the other three.
    ComprehensiveReport,
}

impl AgentKind {
    /// The analysis agents, in the order the pipeline runs them.
    pub const ANALYSTS: [AgentKind; 3] = [
        AgentKind::Legal,
        AgentKind::Economics,
        AgentKind::BusinessStructure,
    ];

    /// Key under which this agent's output is stored.
    pub fn key(&self) -> &'static str {
        match self {
            AgentKind::Legal => "Legal",
            AgentKind::Economics => "Economics",
            AgentKind::BusinessStructure => "BusinessStructure",
            AgentKind::ComprehensiveReport => "ComprehensiveReport",
        }
    }

    /// Human-readable name used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            AgentKind::Legal => "Legal Analysis",
            AgentKind::Economics => "Economic Analysis",
            AgentKind::BusinessStructure => "Business Structure Analysis",
            AgentKind::ComprehensiveReport => "Comprehensive Report",
        }
    }

    /// Literal result substituted when the agent fails as a whole.
    pub fn error_message(&self) -> &'static str {
        match self {
            AgentKind::Legal => "An error occurred during legal analysis.",
            AgentKind::Economics => "An error occurred during economic analysis.",
            AgentKind::BusinessStructure => {
                "An error occurred during business structure analysis."
            }
            AgentKind::ComprehensiveReport => "An error occurred during report generation.",
        }
    }

    /// Whether a record field holds a report rather than an analysis.
    pub fn is_report_key(key: &str) -> bool {
        key == AgentKind::ComprehensiveReport.key() || key == LEGACY_REPORT_KEY
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Caller-supplied description of a startup idea.
///
/// Unknown keys are carried along untouched; the agents read only the
/// fields they recognize and fall back to fixed defaults for the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdeaInput {
    fields: BTreeMap<String, String>,
}

impl IdeaInput {
    pub const INDUSTRY: &'static str = "industry";
    pub const BUSINESS_MODEL: &'static str = "business_model";
    pub const BUSINESS_MODEL_TYPE: &'static str = "business_model_type";
    pub const COMPANY_SIZE: &'static str = "company_size";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Get a field, treating blank values as missing.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn industry(&self) -> &str {
        self.get_or(Self::INDUSTRY, "General")
    }

    pub fn business_model(&self) -> &str {
        self.get_or(Self::BUSINESS_MODEL, "Standard")
    }

    pub fn business_model_type(&self) -> &str {
        self.get_or(Self::BUSINESS_MODEL_TYPE, "Standard")
    }

    pub fn company_size(&self) -> &str {
        self.get_or(Self::COMPANY_SIZE, "Startup")
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Overlay another input's fields on top of this one.
    pub fn merge(&mut self, other: IdeaInput) {
        self.fields.extend(other.fields);
    }
}

/// Where a section's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Produced by the model.
    Generated,
    /// Placeholder substituted after a failed completion.
    Fallback,
}

impl Provenance {
    pub fn emoji(&self) -> &'static str {
        match self {
            Provenance::Generated => "✅",
            Provenance::Fallback => "⚠️",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Generated => write!(f, "Generated"),
            Provenance::Fallback => write!(f, "Fallback"),
        }
    }
}

/// One labeled block of an agent's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub body: String,
    pub provenance: Provenance,
}

impl Section {
    pub fn generated(title: &str, body: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            body: body.into(),
            provenance: Provenance::Generated,
        }
    }

    pub fn fallback(title: &str, body: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            body: body.into(),
            provenance: Provenance::Fallback,
        }
    }

    /// Render as `**Title:**` followed by the body.
    pub fn render(&self) -> String {
        format!("**{}:**\n\n{}\n", self.title, self.body.trim())
    }
}

/// Result of running one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent: AgentKind,
    pub sections: Vec<Section>,
    /// Set when the agent failed as a whole; the sections are then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentOutput {
    pub fn new(agent: AgentKind, sections: Vec<Section>) -> Self {
        Self {
            agent,
            sections,
            error: None,
        }
    }

    /// Output for an agent that did not finish.
    pub fn failed(agent: AgentKind) -> Self {
        Self {
            agent,
            sections: Vec::new(),
            error: Some(agent.error_message().to_string()),
        }
    }

    /// The text stored for this agent.
    pub fn render(&self) -> String {
        if let Some(ref error) = self.error {
            return error.clone();
        }

        self.sections
            .iter()
            .map(Section::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True if any part of this output is a placeholder.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
            || self
                .sections
                .iter()
                .any(|s| s.provenance == Provenance::Fallback)
    }

    /// Titles of the sections that fell back to placeholder text.
    pub fn fallback_titles(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.provenance == Provenance::Fallback)
            .map(|s| s.title.as_str())
            .collect()
    }
}

/// The aggregated report together with how each step went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub text: String,
    /// Outcome of the summarization call.
    pub summary: Provenance,
    /// Outcome of the polishing call.
    pub polish: Provenance,
}

impl ComprehensiveReport {
    pub fn is_degraded(&self) -> bool {
        self.summary == Provenance::Fallback || self.polish == Provenance::Fallback
    }
}

/// Per-stage status recorded in the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub agent: AgentKind,
    pub sections: Vec<SectionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionStatus {
    pub title: String,
    pub provenance: Provenance,
}

impl From<&AgentOutput> for StageSummary {
    fn from(output: &AgentOutput) -> Self {
        Self {
            agent: output.agent,
            sections: output
                .sections
                .iter()
                .map(|s| SectionStatus {
                    title: s.title.clone(),
                    provenance: s.provenance,
                })
                .collect(),
            error: output.error.clone(),
        }
    }
}

impl StageSummary {
    pub fn fallback_count(&self) -> usize {
        let sections = self
            .sections
            .iter()
            .filter(|s| s.provenance == Provenance::Fallback)
            .count();
        sections + usize::from(self.error.is_some())
    }
}

/// Metadata about a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Identifier the outputs were stored under.
    pub idea_id: String,
    /// When the run started.
    pub run_date: DateTime<Utc>,
    /// Name of the model used for the report.
    pub model_used: String,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub input: IdeaInput,
    pub stages: Vec<StageSummary>,
    /// The comprehensive report as read back from the store.
    pub report: String,
}

impl RunReport {
    /// Total number of placeholder sections across all stages.
    pub fn fallback_count(&self) -> usize {
        self.stages.iter().map(StageSummary::fallback_count).sum()
    }
}
