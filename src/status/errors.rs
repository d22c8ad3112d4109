use crate::utils::truncate_to_limit;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

const ERRORS_PRESENT: i32 = 1;
const NO_ERRORS: i32 = 0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
pub enum ErrorCode {
    #[serde(rename = "ERROR")]
    #[strum(serialize = "ERROR")]
    Default,
    #[serde(rename = "OPERATION_FAILED")]
    #[strum(serialize = "OPERATION_FAILED")]
    OperationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

/// The `errors` object embedded in a summary substatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub code: i32,
    pub details: Vec<ErrorDetail>,
    pub message: String,
}

/// Payload JSON-encoded into a summary substatus `formattedMessage.message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub activity_id: String,
    pub start_time: String,
    pub last_modified_time: String,
    pub errors: ErrorSummary,
}

/// Bounded list of error details, newest first.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    cap: usize,
    max_message_chars: usize,
    details: VecDeque<ErrorDetail>,
    total: usize,
}

impl ErrorLog {
    pub fn new(cap: usize, max_message_chars: usize) -> Self {
        Self {
            cap: cap.max(1),
            max_message_chars,
            details: VecDeque::with_capacity(cap),
            total: 0,
        }
    }

    /// Records an error. `None` is ignored; a message identical to one
    /// already listed is not repeated. Returns whether a detail was added.
    pub fn add(&mut self, message: Option<&str>, code: ErrorCode) -> bool {
        let Some(message) = message else {
            return false;
        };
        let message = truncate_to_limit(message, self.max_message_chars);
        if self.details.iter().any(|detail| detail.message == message) {
            return false;
        }

        while self.details.len() >= self.cap {
            self.details.pop_back();
        }
        self.details.push_front(ErrorDetail { code, message });
        self.total += 1;
        true
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn details(&self) -> impl Iterator<Item = &ErrorDetail> {
        self.details.iter()
    }

    pub fn summary(&self, log_file: Option<&Path>) -> ErrorSummary {
        let mut message = format!("{} error/s reported.", self.total);
        if self.total > 0 {
            message.push_str(&format!(
                " The latest {} error/s are shared in detail.",
                self.details.len()
            ));
            if let Some(log_file) = log_file {
                message.push_str(&format!(
                    " To view all errors, review this log file on the machine: {}",
                    log_file.display()
                ));
            }
        }

        ErrorSummary {
            code: if self.total > 0 { ERRORS_PRESENT } else { NO_ERRORS },
            details: self.details.iter().cloned().collect(),
            message,
        }
    }
}
