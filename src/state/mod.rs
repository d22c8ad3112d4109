//! Durable records shared between invocations and the worker host.
//!
//! Both stores distinguish a missing file (`Ok(None)`, a valid initial state)
//! from a file that cannot be parsed (`StateError::Read`).

mod core_state;
mod ext_state;
mod store;

pub use core_state::{CORE_STATE_FILE, CoreStateRecord, CoreStateStore};
pub use ext_state::{EXT_STATE_FILE, ExtensionStateRecord, ExtensionStateStore};
