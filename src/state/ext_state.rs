use super::store::JsonStateFile;
use crate::config::Operation;
use crate::error::StateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const EXT_STATE_FILE: &str = "ExtState.json";

/// What the most recent invocation was asked to do, and by when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtensionStateRecord {
    pub number: u64,
    pub achieve_enable_by: DateTime<Utc>,
    pub operation: Operation,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ExtensionStateEnvelope {
    extension_sequence: ExtensionStateRecord,
}

#[derive(Debug, Clone)]
pub struct ExtensionStateStore {
    file: JsonStateFile,
}

impl ExtensionStateStore {
    pub fn new(state_folder: &Path) -> Self {
        Self {
            file: JsonStateFile::new(state_folder, EXT_STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read(&self) -> Result<Option<ExtensionStateRecord>, StateError> {
        Ok(self
            .file
            .read::<ExtensionStateEnvelope>()?
            .map(|envelope| envelope.extension_sequence))
    }

    /// Overwrites the record for the current invocation.
    pub fn create(
        &self,
        number: u64,
        operation: Operation,
        achieve_enable_by: DateTime<Utc>,
    ) -> Result<ExtensionStateRecord, StateError> {
        let record = ExtensionStateRecord {
            number,
            achieve_enable_by,
            operation,
        };
        self.write(&record)?;
        Ok(record)
    }

    pub fn write(&self, record: &ExtensionStateRecord) -> Result<(), StateError> {
        self.file.write(&ExtensionStateEnvelope {
            extension_sequence: record.clone(),
        })
    }
}
