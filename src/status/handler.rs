use super::document::{
    FormattedMessage, OperationStatus, StatusDocument, Substatus, summary_name, utc_timestamp,
};
use super::errors::{ErrorCode, ErrorLog, OperationSummary};
use crate::config::{Operation, StatusConfig};
use crate::error::StatusError;
use crate::utils::write_text_atomic;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const STATUS_EXTENSION: &str = "status";

/// Reads and rewrites the status document of the active sequence number and
/// accumulates the errors reported in its summary substatus.
#[derive(Debug)]
pub struct StatusHandler {
    status_folder: PathBuf,
    sequence_number: u64,
    errors: ErrorLog,
    log_file: Option<PathBuf>,
}

impl StatusHandler {
    pub fn new(status_folder: &Path, sequence_number: u64, config: &StatusConfig) -> Self {
        Self {
            status_folder: status_folder.to_path_buf(),
            sequence_number,
            errors: ErrorLog::new(config.error_detail_cap, config.error_message_max_chars),
            log_file: None,
        }
    }

    /// Log file referenced from error summaries.
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn path(&self) -> PathBuf {
        status_path(&self.status_folder, self.sequence_number)
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    /// Replaces the file with a fresh document without substatus.
    pub fn write_new(
        &self,
        operation: Operation,
        status: OperationStatus,
    ) -> Result<(), StatusError> {
        tracing::debug!(%operation, %status, path = %self.path().display(), "writing new status file");
        self.write(&StatusDocument::new(operation, status))
    }

    /// Marks the document of `target_sequence` as transitioning again.
    ///
    /// Returns `Ok(false)` without touching anything when `target_sequence`
    /// is not the active sequence or when its status file does not exist.
    pub fn update(
        &self,
        target_sequence: u64,
        status_folder: &Path,
    ) -> Result<bool, StatusError> {
        if target_sequence != self.sequence_number {
            tracing::info!(
                target_sequence,
                active_sequence = self.sequence_number,
                "status update skipped for inactive sequence"
            );
            return Ok(false);
        }

        let path = status_path(status_folder, target_sequence);
        let Some(mut document) = read_document(&path)? else {
            tracing::info!(path = %path.display(), "status update skipped, no status file");
            return Ok(false);
        };

        document.touch();
        document.status.status = OperationStatus::Transitioning;
        write_document(&path, &document)?;
        Ok(true)
    }

    /// Records an error for the summary substatus. `None` is a no-op.
    pub fn add_error(&mut self, message: Option<&str>, code: ErrorCode) {
        if self.errors.add(message, code) {
            tracing::warn!(%code, message = message.unwrap_or_default(), "error added to status");
        }
    }

    /// Rebuilds the no-operation summary substatus and writes the document.
    pub fn set_no_operation_substatus(
        &self,
        operation: Operation,
        activity_id: &str,
        start_time: DateTime<Utc>,
        status: OperationStatus,
    ) -> Result<(), StatusError> {
        let mut document = StatusDocument::new(operation, status);
        document.upsert_substatus(self.summary_substatus(
            Operation::NoOperation,
            activity_id,
            start_time,
            status,
        )?);
        self.write(&document)
    }

    /// Sets the top-level status and the operation summary, keeping other
    /// substatus entries already in the file.
    pub fn set_operation_status(
        &self,
        operation: Operation,
        activity_id: &str,
        start_time: DateTime<Utc>,
        status: OperationStatus,
    ) -> Result<(), StatusError> {
        let mut document = match read_document(&self.path()) {
            Ok(Some(document)) => document,
            Ok(None) => StatusDocument::new(operation, status),
            Err(error) => {
                tracing::warn!(%error, "replacing unreadable status file");
                StatusDocument::new(operation, status)
            }
        };
        document.touch();
        document.status.operation = operation;
        document.status.status = status;
        document.upsert_substatus(self.summary_substatus(
            operation,
            activity_id,
            start_time,
            status,
        )?);
        self.write(&document)
    }

    pub fn read(&self) -> Result<StatusDocument, StatusError> {
        let path = self.path();
        read_document(&path)?.ok_or(StatusError::NotFound(path))
    }

    fn summary_substatus(
        &self,
        operation: Operation,
        activity_id: &str,
        start_time: DateTime<Utc>,
        status: OperationStatus,
    ) -> Result<Substatus, StatusError> {
        let summary = OperationSummary {
            activity_id: activity_id.to_string(),
            start_time: start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            last_modified_time: utc_timestamp(),
            errors: self.errors.summary(self.log_file.as_deref()),
        };
        Ok(Substatus {
            name: summary_name(operation).into(),
            status,
            code: 0,
            formatted_message: FormattedMessage::new(serde_json::to_string(&summary)?),
        })
    }

    fn write(&self, document: &StatusDocument) -> Result<(), StatusError> {
        write_document(&self.path(), document)
    }
}

pub(super) fn status_path(status_folder: &Path, sequence_number: u64) -> PathBuf {
    status_folder.join(format!("{sequence_number}.{STATUS_EXTENSION}"))
}

fn read_document(path: &Path) -> Result<Option<StatusDocument>, StatusError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(StatusError::Corrupt {
                path: path.to_path_buf(),
                message: error.to_string(),
            });
        }
    };

    let corrupt = |message: String| StatusError::Corrupt {
        path: path.to_path_buf(),
        message,
    };
    let mut documents: Vec<StatusDocument> =
        serde_json::from_str(&raw).map_err(|error| corrupt(error.to_string()))?;
    if documents.len() != 1 {
        return Err(corrupt(format!(
            "expected exactly one status entry, found {}",
            documents.len()
        )));
    }
    Ok(documents.pop())
}

fn write_document(path: &Path, document: &StatusDocument) -> Result<(), StatusError> {
    let json = serde_json::to_string(&[document])?;
    write_text_atomic(path, &json).map_err(|error| StatusError::Write {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}
