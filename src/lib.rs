#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod error;
pub mod logging;
#[doc(hidden)]
pub mod platform;
pub mod reconcile;
pub mod state;
pub mod status;
pub mod utils;
pub mod worker;

pub use config::{AgentConfig, ConfigSettings, Operation};
pub use error::{AgentError, ExitCode, Result};
pub use reconcile::{EnableOutcome, RequestReconciler};
pub use worker::{WorkerHost, WorkerOutcome};
