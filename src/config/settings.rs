//! Host-supplied per-sequence settings (`<config_folder>/<seq>.settings`).

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const SETTINGS_EXTENSION: &str = "settings";

/// Operation requested by the host.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Operation {
    #[serde(rename = "Assessment")]
    #[strum(serialize = "Assessment")]
    Assess,
    #[serde(rename = "Installation")]
    #[strum(serialize = "Installation")]
    Install,
    NoOperation,
}

/// Settings for one invocation, fixed once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSettings {
    pub sequence_number: u64,
    pub operation: Operation,
    pub activity_id: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    runtime_settings: Vec<RuntimeSettings>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeSettings {
    handler_settings: HandlerSettings,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandlerSettings {
    public_settings: PublicSettings,
}

// Hosts send additional public settings (classifications, reboot policy)
// that belong to the patch core; only the fields below are required here.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicSettings {
    operation: Operation,
    activity_id: String,
    start_time: String,
}

impl ConfigSettings {
    pub fn settings_path(config_folder: &Path, sequence_number: u64) -> PathBuf {
        config_folder.join(format!("{sequence_number}.{SETTINGS_EXTENSION}"))
    }

    pub fn read(config_folder: &Path, sequence_number: u64) -> Result<Self, ConfigError> {
        let path = Self::settings_path(config_folder, sequence_number);
        let raw = fs::read_to_string(&path).map_err(|error| ConfigError::Read {
            path: path.clone(),
            message: error.to_string(),
        })?;
        Self::parse(&raw, sequence_number).map_err(|message| ConfigError::Read { path, message })
    }

    fn parse(raw: &str, sequence_number: u64) -> Result<Self, String> {
        let file: SettingsFile = serde_json::from_str(raw).map_err(|error| error.to_string())?;
        let public = file
            .runtime_settings
            .into_iter()
            .next()
            .ok_or_else(|| "runtimeSettings is empty".to_string())?
            .handler_settings
            .public_settings;

        let start_time = DateTime::parse_from_rfc3339(&public.start_time)
            .map_err(|error| format!("startTime '{}' is invalid: {error}", public.start_time))?
            .with_timezone(&Utc);

        Ok(Self {
            sequence_number,
            operation: public.operation,
            activity_id: public.activity_id,
            start_time,
        })
    }
}

/// Picks the sequence number for this invocation: the explicit value when
/// given, otherwise the most recently modified `<n>.settings` file.
pub fn resolve_sequence_number(
    explicit: Option<u64>,
    config_folder: &Path,
) -> Result<u64, ConfigError> {
    if let Some(sequence_number) = explicit {
        return Ok(sequence_number);
    }

    let entries = fs::read_dir(config_folder).map_err(|error| ConfigError::Read {
        path: config_folder.to_path_buf(),
        message: error.to_string(),
    })?;

    let mut newest: Option<(SystemTime, u64)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(SETTINGS_EXTENSION) {
            continue;
        }
        let Some(sequence_number) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u64>().ok())
        else {
            continue;
        };
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let is_newer = newest.is_none_or(|(best_time, best_seq)| {
            (modified, sequence_number) > (best_time, best_seq)
        });
        if is_newer {
            newest = Some((modified, sequence_number));
        }
    }

    newest
        .map(|(_, sequence_number)| sequence_number)
        .ok_or_else(|| ConfigError::MissingSequence(config_folder.to_path_buf()))
}
