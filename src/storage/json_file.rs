//! Record store backed by a single JSON document on disk.
//!
//! Every operation reads the whole document; writes rewrite it through a
//! temporary file in the same directory that is then renamed over the
//! original. Read-modify-write cycles are serialized by an in-process
//! mutex. Separate processes sharing the file can still lose updates.

use super::{to_pretty_json, RecordStore, StoreError};
use crate::models::IdeaRecord;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

type Document = Map<String, Value>;

pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store, creating an empty document if the file is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            lock: Mutex::new(()),
        };

        if !store.path.exists() {
            if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            store.save(&Document::new())?;
            debug!("Created empty record store at {}", store.path.display());
        }

        Ok(store)
    }

    /// Open the store without touching the filesystem.
    ///
    /// A missing file reads as an empty document; nothing is created until
    /// the first write.
    pub fn open_existing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Document, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Document::new());
        }

        let value: Value =
            serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        match value {
            Value::Object(document) => Ok(document),
            _ => Err(StoreError::NotAnObject(self.path.clone())),
        }
    }

    fn save(&self, document: &Document) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let json = to_pretty_json(document).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(io_error)?;
        temp.write_all(json.as_bytes()).map_err(io_error)?;
        temp.flush().map_err(io_error)?;
        temp.persist(&self.path).map_err(|e| io_error(e.error))?;

        Ok(())
    }
}

/// Convert a stored record to text values.
///
/// Documents written by other tools may hold non-string values; those are
/// returned as compact JSON text.
fn record_from_value(idea_id: &str, value: &Value) -> IdeaRecord {
    match value {
        Value::Object(fields) => fields
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect(),
        _ => {
            warn!("Record for idea_id {} is not an object; ignoring it", idea_id);
            IdeaRecord::new()
        }
    }
}

impl RecordStore for JsonFileStore {
    fn try_store_output(
        &self,
        agent_type: &str,
        output_data: &str,
        idea_id: &str,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut document = self.load()?;

        let entry = document
            .entry(idea_id.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            warn!("Replacing non-object record for idea_id {}", idea_id);
            *entry = Value::Object(Map::new());
        }

        if let Value::Object(record) = entry {
            record.insert(
                agent_type.to_string(),
                Value::String(output_data.to_string()),
            );
        }

        self.save(&document)
    }

    fn try_retrieve_outputs(&self, idea_id: &str) -> Result<IdeaRecord, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let document = self.load()?;

        Ok(document
            .get(idea_id)
            .map(|value| record_from_value(idea_id, value))
            .unwrap_or_default())
    }

    fn try_idea_ids(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let document = self.load()?;

        let mut ids: Vec<String> = document.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
