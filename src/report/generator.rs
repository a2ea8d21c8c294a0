//! Markdown run report generation.
//!
//! This module renders a pipeline run (its metadata, inputs, per-stage
//! status and the comprehensive report text) as Markdown or JSON.

use crate::models::{IdeaInput, Provenance, RunMetadata, RunReport, StageSummary};
use anyhow::Result;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# StartupGPT Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata, report.fallback_count()));
    output.push_str(&generate_input_section(&report.input));
    output.push_str(&generate_stages_section(&report.stages));
    output.push_str(&generate_report_section(&report.report));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata, fallbacks: usize) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Idea ID:** `{}`\n", metadata.idea_id));
    section.push_str(&format!(
        "- **Run Date:** {}\n",
        metadata.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    if fallbacks > 0 {
        section.push_str(&format!("- **Placeholder Sections:** {}\n", fallbacks));
    }
    section.push_str(&format!(
        "- **Run Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the input fields table.
fn generate_input_section(input: &IdeaInput) -> String {
    let mut section = String::new();

    section.push_str("## Input\n\n");
    section.push_str("| Field | Value |\n");
    section.push_str("|:---|:---|\n");

    let effective = [
        (IdeaInput::INDUSTRY, input.industry()),
        (IdeaInput::BUSINESS_MODEL, input.business_model()),
        (IdeaInput::BUSINESS_MODEL_TYPE, input.business_model_type()),
        (IdeaInput::COMPANY_SIZE, input.company_size()),
    ];
    for (field, value) in effective {
        let marker = if input.get(field).is_some() { "" } else { " *(default)*" };
        section.push_str(&format!("| {} | {}{} |\n", field, value, marker));
    }

    // Extra fields are carried along but no agent reads them
    for (field, value) in input.fields() {
        if !effective.iter().any(|(known, _)| *known == field.as_str()) {
            section.push_str(&format!("| {} | {} |\n", field, value));
        }
    }
    section.push('\n');

    section
}

/// Generate the per-stage status section.
fn generate_stages_section(stages: &[StageSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Stages\n\n");
    section.push_str("| Stage | Section | Status |\n");
    section.push_str("|:---|:---|:---:|\n");

    for stage in stages {
        if let Some(ref error) = stage.error {
            section.push_str(&format!(
                "| {} | - | {} {} |\n",
                stage.agent.label(),
                Provenance::Fallback.emoji(),
                error
            ));
            continue;
        }

        for status in &stage.sections {
            section.push_str(&format!(
                "| {} | {} | {} {} |\n",
                stage.agent.label(),
                status.title,
                status.provenance.emoji(),
                status.provenance
            ));
        }
    }
    section.push('\n');

    section
}

fn generate_report_section(text: &str) -> String {
    format!("## Comprehensive Report\n\n{}\n\n", text.trim())
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by StartupGPT v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to `path`.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
