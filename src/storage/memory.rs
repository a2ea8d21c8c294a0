//! In-memory record store, used for `run --no-save`.

use super::{RecordStore, StoreError};
use crate::models::IdeaRecord;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, IdeaRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn try_store_output(
        &self,
        agent_type: &str,
        output_data: &str,
        idea_id: &str,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records
            .entry(idea_id.to_string())
            .or_default()
            .insert(agent_type.to_string(), output_data.to_string());
        Ok(())
    }

    fn try_retrieve_outputs(&self, idea_id: &str) -> Result<IdeaRecord, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(idea_id).cloned().unwrap_or_default())
    }

    fn try_idea_ids(&self) -> Result<Vec<String>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.keys().cloned().collect())
    }
}
