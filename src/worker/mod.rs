//! Worker host: the detached `core` process started by the reconciler.
//!
//! It owns the core state file while it runs, launches the configured patch
//! core program and reports the terminal status of the operation.

mod host;

pub use host::{
    ACTIVITY_ID_ENV, OPERATION_ENV, SEQUENCE_NUMBER_ENV, WorkerHost, WorkerOutcome,
};
