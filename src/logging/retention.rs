use super::LOG_EXTENSION;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Deletes all but the `keep` most recently modified `*.log` files in
/// `log_folder`. Returns how many files were removed.
pub fn prune_logs(log_folder: &Path, keep: usize) -> io::Result<usize> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(log_folder)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        logs.push((modified, path));
    }

    logs.sort_by(|a, b| b.cmp(a));
    let mut removed = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error),
        }
    }
    Ok(removed)
}
