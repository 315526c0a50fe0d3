use crate::error::{Error, Result};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::Path,
};
use tracing::debug;

/// Writes `content` to `path` atomically, creating parent directories.
///
/// # Process
///
/// 1. Writes content to a sibling temporary file
/// 2. Syncs the temporary file to disk
/// 3. Renames it over the target path
///
/// A reader never observes a half-written document.
///
/// # Errors
///
/// Returns an error if any filesystem operation fails.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
    drop(temp_file);

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Serializes `value` as pretty-printed JSON and writes it atomically.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json)
}
