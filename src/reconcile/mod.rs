//! The enable state machine.
//!
//! Nothing here is persisted as an explicit state: each invocation derives
//! its [`RequestKind`] from the core state file and acts on it.

mod reconciler;
mod request;

pub use reconciler::{EnableOutcome, RequestReconciler};
pub use request::{RequestKind, classify};
