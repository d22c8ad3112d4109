use std::path::PathBuf;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the patch agent.
///
/// Each subsystem defines its own error variant. The entry point maps these to
/// process exit codes; everything below the reconciler stays in typed errors so
/// callers can decide whether a failure is fatal or only reportable.
#[derive(Debug, Error)]
pub enum AgentError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Durable state ────────────────────────────────────────────────────
    #[error("state: {0}")]
    State(#[from] StateError),

    // ── Status document ──────────────────────────────────────────────────
    #[error("status: {0}")]
    Status(#[from] StatusError),

    // ── Process supervision ──────────────────────────────────────────────
    #[error("process: {0}")]
    Process(#[from] ProcessError),

    // ── Patch operation ──────────────────────────────────────────────────
    #[error("operation: {0}")]
    Operation(#[from] OperationError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Agent configuration file could not be loaded.
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Host-supplied per-sequence settings are missing or malformed.
    #[error("failed to read settings {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("no sequence number supplied and none found in {0}")]
    MissingSequence(PathBuf),
}

// ─── State store errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to write state file {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("failed to delete state file {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {0} was expected but is missing")]
    Missing(PathBuf),
}

// ─── Status document errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("corrupt status file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("status file {0} does not exist")]
    NotFound(PathBuf),

    #[error("failed to write status file {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}

// ─── Process supervision errors ──────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

// ─── Patch operation errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OperationError {
    /// Failure inside an operation. `reported` is set once the failure has
    /// been written to the status document.
    #[error("{message}")]
    Runtime { message: String, reported: bool },
}

impl OperationError {
    /// A failure whose details are already in the status document.
    pub fn reported(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
            reported: true,
        }
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, Self::Runtime { reported: true, .. })
    }
}

// ─── Exit codes ──────────────────────────────────────────────────────────────

/// Exit codes surfaced to the host. Only agent-level faults are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum ExitCode {
    Okay = 0,
    HandlerFailed = 1,
    MissingConfig = 2,
    BadConfig = 3,
    StateUnreadable = 4,
    StatusUnreadable = 5,
    LaunchFailed = 6,
}

impl ExitCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<&AgentError> for ExitCode {
    fn from(error: &AgentError) -> Self {
        match error {
            AgentError::Config(ConfigError::Read { .. } | ConfigError::MissingSequence(_)) => {
                Self::MissingConfig
            }
            AgentError::Config(_) => Self::BadConfig,
            AgentError::State(_) => Self::StateUnreadable,
            AgentError::Status(_) => Self::StatusUnreadable,
            AgentError::Process(ProcessError::Launch { .. }) => Self::LaunchFailed,
            AgentError::Process(_) | AgentError::Operation(_) | AgentError::Other(_) => {
                Self::HandlerFailed
            }
        }
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, AgentError>;
