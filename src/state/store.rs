use crate::error::StateError;
use crate::utils::{remove_file_if_exists, write_text_atomic};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One JSON document on disk with atomic replace semantics.
#[derive(Debug, Clone)]
pub(super) struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    pub(super) fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            path: dir.join(file_name),
        }
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    pub(super) fn read<T: DeserializeOwned>(&self) -> Result<Option<T>, StateError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    message: error.to_string(),
                });
            }
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|error| StateError::Read {
                path: self.path.clone(),
                message: error.to_string(),
            })
    }

    pub(super) fn write<T: Serialize>(&self, value: &T) -> Result<(), StateError> {
        let json = serde_json::to_string(value).map_err(|error| StateError::Write {
            path: self.path.clone(),
            message: error.to_string(),
        })?;
        write_text_atomic(&self.path, &json).map_err(|error| StateError::Write {
            path: self.path.clone(),
            message: error.to_string(),
        })
    }

    pub(super) fn delete(&self, missing_ok: bool) -> Result<(), StateError> {
        let removed = remove_file_if_exists(&self.path).map_err(|source| StateError::Delete {
            path: self.path.clone(),
            source,
        })?;
        if !removed && !missing_ok {
            return Err(StateError::Missing(self.path.clone()));
        }
        Ok(())
    }
}
