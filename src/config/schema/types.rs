use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Path to agent.toml - resolved at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub core: CoreConfig,
}

/// Folders shared with the host. Relative entries resolve against the
/// directory holding the config file; `~` is expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_config_folder")]
    pub config_folder: String,
    #[serde(default = "default_status_folder")]
    pub status_folder: String,
    #[serde(default = "default_log_folder")]
    pub log_folder: String,
    #[serde(default = "default_state_folder")]
    pub state_folder: String,
}

fn default_config_folder() -> String {
    "config".into()
}

fn default_status_folder() -> String {
    "status".into()
}

fn default_log_folder() -> String {
    "logs".into()
}

fn default_state_folder() -> String {
    "state".into()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_folder: default_config_folder(),
            status_folder: default_status_folder(),
            log_folder: default_log_folder(),
            state_folder: default_state_folder(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Time an enable request is given before a later request may terminate it.
    #[serde(default = "default_enable_max_runtime_minutes")]
    pub enable_max_runtime_minutes: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_termination_grace_secs")]
    pub termination_grace_secs: u64,
    #[serde(default = "default_terminate_attempts")]
    pub terminate_attempts: u32,
    /// Relaunch an abandoned re-enable even when its deadline has passed.
    #[serde(default = "default_true")]
    pub relaunch_after_deadline: bool,
}

fn default_enable_max_runtime_minutes() -> u64 {
    3
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_termination_grace_secs() -> u64 {
    10
}

pub const MAX_TERMINATE_ATTEMPTS: u32 = 10;

fn default_terminate_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enable_max_runtime_minutes: default_enable_max_runtime_minutes(),
            poll_interval_secs: default_poll_interval_secs(),
            termination_grace_secs: default_termination_grace_secs(),
            terminate_attempts: default_terminate_attempts(),
            relaunch_after_deadline: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_error_detail_cap")]
    pub error_detail_cap: usize,
    #[serde(default = "default_error_message_max_chars")]
    pub error_message_max_chars: usize,
}

fn default_error_detail_cap() -> usize {
    5
}

fn default_error_message_max_chars() -> usize {
    128
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            error_detail_cap: default_error_detail_cap(),
            error_message_max_chars: default_error_message_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_retained_log_files")]
    pub retained_log_files: usize,
    /// "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_retained_log_files() -> usize {
    10
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            retained_log_files: default_retained_log_files(),
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Patch core program and arguments run by the worker host.
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Extra argv prefixes (whitespace separated) that identify our processes.
    #[serde(default)]
    pub process_signatures: Vec<String>,
}

fn default_heartbeat_secs() -> u64 {
    30
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            heartbeat_secs: default_heartbeat_secs(),
            process_signatures: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn config_folder(&self) -> PathBuf {
        self.resolve_folder(&self.paths.config_folder)
    }

    pub fn status_folder(&self) -> PathBuf {
        self.resolve_folder(&self.paths.status_folder)
    }

    pub fn log_folder(&self) -> PathBuf {
        self.resolve_folder(&self.paths.log_folder)
    }

    pub fn state_folder(&self) -> PathBuf {
        self.resolve_folder(&self.paths.state_folder)
    }

    fn resolve_folder(&self, raw: &str) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(raw).as_ref());
        if expanded.is_absolute() {
            return expanded;
        }
        self.base_dir().join(expanded)
    }

    fn base_dir(&self) -> &Path {
        self.config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.enable_max_runtime_minutes == 0 {
            return Err(ConfigError::Validation(
                "runtime.enable_max_runtime_minutes must be at least 1".into(),
            ));
        }
        if self.runtime.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "runtime.poll_interval_secs must be at least 1".into(),
            ));
        }
        if !(1..=MAX_TERMINATE_ATTEMPTS).contains(&self.runtime.terminate_attempts) {
            return Err(ConfigError::Validation(format!(
                "runtime.terminate_attempts must be between 1 and {MAX_TERMINATE_ATTEMPTS}"
            )));
        }
        if self.status.error_detail_cap == 0 {
            return Err(ConfigError::Validation(
                "status.error_detail_cap must be at least 1".into(),
            ));
        }
        if self.status.error_message_max_chars < 16 {
            return Err(ConfigError::Validation(
                "status.error_message_max_chars must be at least 16".into(),
            ));
        }
        if self.logging.retained_log_files == 0 {
            return Err(ConfigError::Validation(
                "logging.retained_log_files must be at least 1".into(),
            ));
        }
        if tracing::Level::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::Validation(format!(
                "logging.level '{}' is not a tracing level",
                self.logging.level
            )));
        }
        if self.core.heartbeat_secs == 0 {
            return Err(ConfigError::Validation(
                "core.heartbeat_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
