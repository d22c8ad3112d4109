//! The externally polled `<seq>.status` document.
//!
//! Every mutation rewrites the whole file through a temp-file rename; the
//! poller never sees a partial document.

mod document;
mod errors;
mod handler;

pub use document::{
    FormattedMessage, NO_OPERATION_SUMMARY, OperationStatus, STATUS_NAME, StatusBody,
    StatusDocument, Substatus, summary_name,
};
pub use errors::{ErrorCode, ErrorDetail, ErrorLog, ErrorSummary, OperationSummary};
pub use handler::StatusHandler;
