use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Writes text using a temp file in the destination directory followed by a
/// rename, so a concurrent reader sees either the old or the new content.
pub fn write_text_atomic(path: &Path, content: &str) -> io::Result<()> {
    if path.as_os_str().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "destination path cannot be empty",
        ));
    }
    if path.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination path '{}' is a directory", path.display()),
        ));
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir)?;

    let temp_path = temp_path_for(parent_dir, path);
    fs::write(&temp_path, content)?;

    if let Err(rename_error) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(rename_error);
    }

    Ok(())
}

/// Removes `path`. Returns `Ok(false)` when there was nothing to remove.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

fn temp_path_for(parent_dir: &Path, path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("state");
    parent_dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()))
}
