use crate::config::Operation;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_NAME: &str = "Patch Management";
pub const NO_OPERATION_SUMMARY: &str = "PatchNoOperationSummary";

const STATUS_VERSION: f64 = 1.0;
const MESSAGE_LANG: &str = "en-US";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OperationStatus {
    Transitioning,
    Success,
    Error,
}

/// Name of the summary substatus reported for `operation`.
pub fn summary_name(operation: Operation) -> &'static str {
    match operation {
        Operation::Assess => "PatchAssessmentSummary",
        Operation::Install => "PatchInstallationSummary",
        Operation::NoOperation => NO_OPERATION_SUMMARY,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub version: f64,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: String,
    pub status: StatusBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub name: String,
    pub operation: Operation,
    pub status: OperationStatus,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub formatted_message: FormattedMessage,
    #[serde(default)]
    pub substatus: Vec<Substatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substatus {
    pub name: String,
    pub status: OperationStatus,
    #[serde(default)]
    pub code: i32,
    pub formatted_message: FormattedMessage,
}

/// `message` carries plain text at the top level and a JSON-encoded summary
/// object inside substatus entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedMessage {
    pub lang: String,
    pub message: String,
}

impl Default for FormattedMessage {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl FormattedMessage {
    pub fn new(message: String) -> Self {
        Self {
            lang: MESSAGE_LANG.into(),
            message,
        }
    }
}

impl StatusDocument {
    pub fn new(operation: Operation, status: OperationStatus) -> Self {
        Self {
            version: STATUS_VERSION,
            timestamp_utc: utc_timestamp(),
            status: StatusBody {
                name: STATUS_NAME.into(),
                operation,
                status,
                code: 0,
                formatted_message: FormattedMessage::default(),
                substatus: Vec::new(),
            },
        }
    }

    pub fn touch(&mut self) {
        self.timestamp_utc = utc_timestamp();
    }

    /// Inserts or replaces the substatus with the same name.
    pub fn upsert_substatus(&mut self, substatus: Substatus) {
        match self
            .status
            .substatus
            .iter_mut()
            .find(|existing| existing.name == substatus.name)
        {
            Some(existing) => *existing = substatus,
            None => self.status.substatus.push(substatus),
        }
    }
}

pub(super) fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
