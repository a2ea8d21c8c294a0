//! Record storage for agent outputs.
//!
//! A record store maps an idea identifier to an [`IdeaRecord`]: one text
//! value per agent type, last write wins. The `try_*` methods report
//! failures; the plain methods log them and carry on, so a broken store
//! never stops a pipeline run.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::models::{IdeaRecord, LEGACY_REPORT_KEY};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

/// Failure of a store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("document root of {0} is not a JSON object")]
    NotAnObject(PathBuf),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Keyed persistence for agent outputs.
pub trait RecordStore: Send + Sync {
    /// Set `agent_type` to `output_data` in the record for `idea_id`.
    fn try_store_output(
        &self,
        agent_type: &str,
        output_data: &str,
        idea_id: &str,
    ) -> Result<(), StoreError>;

    /// All outputs for `idea_id`; empty if none were stored.
    fn try_retrieve_outputs(&self, idea_id: &str) -> Result<IdeaRecord, StoreError>;

    /// Identifiers with at least one stored output, sorted.
    fn try_idea_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Store an output, logging instead of failing.
    fn store_output(&self, agent_type: &str, output_data: &str, idea_id: &str) {
        match self.try_store_output(agent_type, output_data, idea_id) {
            Ok(()) => info!("Stored {} output for idea_id: {}", agent_type, idea_id),
            Err(e) => error!("Failed to store output: {}", e),
        }
    }

    /// Retrieve outputs, returning an empty record on failure.
    fn retrieve_outputs(&self, idea_id: &str) -> IdeaRecord {
        self.try_retrieve_outputs(idea_id).unwrap_or_else(|e| {
            error!("Failed to retrieve outputs: {}", e);
            IdeaRecord::new()
        })
    }

    fn idea_ids(&self) -> Vec<String> {
        self.try_idea_ids().unwrap_or_else(|e| {
            error!("Failed to list ideas: {}", e);
            Vec::new()
        })
    }

    /// Write the legacy single-report slot.
    #[allow(dead_code)] // Single-report API for older callers of the store
    fn store_report(&self, report_content: &str, idea_id: &str) {
        match self.try_store_output(LEGACY_REPORT_KEY, report_content, idea_id) {
            Ok(()) => info!("Stored report for idea_id: {}", idea_id),
            Err(e) => error!("Failed to store report: {}", e),
        }
    }

    /// Read the legacy single-report slot.
    #[allow(dead_code)] // Single-report API for older callers of the store
    fn retrieve_report(&self, idea_id: &str) -> String {
        match self.try_retrieve_outputs(idea_id) {
            Ok(mut record) => record
                .remove(LEGACY_REPORT_KEY)
                .unwrap_or_else(|| "No report available.".to_string()),
            Err(e) => {
                error!("Failed to retrieve report: {}", e);
                "Error retrieving report.".to_string()
            }
        }
    }
}

/// Serialize as JSON with 4-space indentation.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only ever writes valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let mut record = IdeaRecord::new();
        record.insert("Legal".to_string(), "L".to_string());

        let json = to_pretty_json(&record).unwrap();
        assert_eq!(json, "{\n    \"Legal\": \"L\"\n}");
    }

    #[test]
    fn test_legacy_report_slot() {
        let store = MemoryStore::new();
        assert_eq!(store.retrieve_report("idea"), "No report available.");

        store.store_report("old style", "idea");
        assert_eq!(store.retrieve_report("idea"), "old style");
        assert_eq!(
            store.retrieve_outputs("idea").get("report").map(String::as_str),
            Some("old style")
        );
    }
}
