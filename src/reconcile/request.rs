use crate::config::Operation;
use crate::state::CoreStateRecord;

/// What an enable invocation is, derived from the requested operation and
/// the core state left behind by earlier invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Cancel whatever the previous operation is doing.
    NoOperation,
    /// Nothing has been tracked on this machine yet.
    First,
    /// A new sequence number replaces the tracked one.
    Supersedes { previous: u64 },
    /// The tracked sequence number was requested again.
    Reenable { completed: bool },
}

pub fn classify(
    operation: Operation,
    sequence_number: u64,
    core_state: Option<&CoreStateRecord>,
) -> RequestKind {
    if operation == Operation::NoOperation {
        return RequestKind::NoOperation;
    }
    match core_state {
        None => RequestKind::First,
        Some(record) if record.number != sequence_number => RequestKind::Supersedes {
            previous: record.number,
        },
        Some(record) => RequestKind::Reenable {
            completed: record.completed,
        },
    }
}
