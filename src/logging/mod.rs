//! Per-invocation log files.
//!
//! Each invocation logs to `<log_folder>/<seq>.<role>.log` without ANSI
//! colors. When the file cannot be opened the subscriber writes to stderr.

mod retention;

pub use retention::prune_logs;

use crate::config::LoggingConfig;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const LOG_EXTENSION: &str = "log";

/// Process role, used in the log file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Enable,
    Core,
}

pub fn log_file_path(log_folder: &Path, sequence_number: u64, role: Role) -> PathBuf {
    log_folder.join(format!("{sequence_number}.{role}.{LOG_EXTENSION}"))
}

/// Installs the global subscriber. Returns the log file in use, if any.
pub fn init_file_logging(
    config: &LoggingConfig,
    log_folder: &Path,
    sequence_number: u64,
    role: Role,
) -> Option<PathBuf> {
    let level = Level::from_str(&config.level).unwrap_or(Level::INFO);
    let path = log_file_path(log_folder, sequence_number, role);

    match open_log_file(&path) {
        Ok(file) => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                return None;
            }
            match prune_logs(log_folder, config.retained_log_files) {
                Ok(removed) if removed > 0 => tracing::debug!(removed, "pruned old log files"),
                Ok(_) => {}
                Err(error) => tracing::warn!(%error, "failed to prune old log files"),
            }
            Some(path)
        }
        Err(error) => {
            init_stderr_logging(level);
            tracing::warn!(path = %path.display(), %error, "log file unavailable, logging to stderr");
            None
        }
    }
}

pub fn init_stderr_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
