use super::store::JsonStateFile;
use crate::config::Operation;
use crate::error::StateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CORE_STATE_FILE: &str = "CoreState.json";

/// The operation currently tracked on this machine, as last written by the
/// worker host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoreStateRecord {
    pub number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Operation>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub process_ids: Vec<u32>,
}

impl CoreStateRecord {
    pub fn started(number: u64, action: Operation, process_ids: Vec<u32>) -> Self {
        Self {
            number,
            action: Some(action),
            completed: false,
            last_heartbeat: Some(Utc::now()),
            process_ids,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CoreStateEnvelope {
    core_sequence: CoreStateRecord,
}

#[derive(Debug, Clone)]
pub struct CoreStateStore {
    file: JsonStateFile,
}

impl CoreStateStore {
    pub fn new(state_folder: &Path) -> Self {
        Self {
            file: JsonStateFile::new(state_folder, CORE_STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read(&self) -> Result<Option<CoreStateRecord>, StateError> {
        Ok(self
            .file
            .read::<CoreStateEnvelope>()?
            .map(|envelope| envelope.core_sequence))
    }

    pub fn write(&self, record: &CoreStateRecord) -> Result<(), StateError> {
        self.file.write(&CoreStateEnvelope {
            core_sequence: record.clone(),
        })
    }

    pub fn delete(&self, missing_ok: bool) -> Result<(), StateError> {
        self.file.delete(missing_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_file_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = CoreStateStore::new(tmp.path());
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn write_then_read_returns_record() {
        let tmp = TempDir::new().unwrap();
        let store = CoreStateStore::new(tmp.path());
        let record = CoreStateRecord::started(5, Operation::Install, vec![4100, 4101]);

        store.write(&record).unwrap();

        assert_eq!(store.read().unwrap(), Some(record));
    }

    #[test]
    fn on_disk_shape_uses_core_sequence_envelope() {
        let tmp = TempDir::new().unwrap();
        let store = CoreStateStore::new(tmp.path());
        store
            .write(&CoreStateRecord {
                number: 2,
                action: None,
                completed: true,
                last_heartbeat: None,
                process_ids: vec![7],
            })
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["coreSequence"]["number"], 2);
        assert_eq!(json["coreSequence"]["completed"], true);
        assert_eq!(json["coreSequence"]["processIds"][0], 7);
    }

    #[test]
    fn malformed_file_is_state_read_error() {
        let tmp = TempDir::new().unwrap();
        let store = CoreStateStore::new(tmp.path());
        std::fs::write(store.path(), "{\"coreSequence\": {\"number\": \"five\"}}").unwrap();

        let err = store.read().unwrap_err();
        assert!(matches!(err, StateError::Read { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = CoreStateStore::new(tmp.path());
        std::fs::write(
            store.path(),
            r#"{"coreSequence":{"number":1,"completed":false,"processIds":[],"reboot":true}}"#,
        )
        .unwrap();

        assert!(matches!(store.read(), Err(StateError::Read { .. })));
    }

    #[test]
    fn delete_respects_missing_ok() {
        let tmp = TempDir::new().unwrap();
        let store = CoreStateStore::new(tmp.path());

        store.delete(true).unwrap();
        assert!(matches!(store.delete(false), Err(StateError::Missing(_))));

        store
            .write(&CoreStateRecord::started(1, Operation::Assess, vec![]))
            .unwrap();
        store.delete(false).unwrap();
        assert_eq!(store.read().unwrap(), None);
    }
}
