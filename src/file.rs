use std::fs;
use std::path::{Path, PathBuf};

/// A file discovered while walking a working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the repository root, `/`-separated
    pub relative_path: String,

    /// Path on disk
    pub absolute_path: PathBuf,

    /// Size in bytes as reported by the filesystem
    pub size_bytes: u64,

    /// Lower-cased extension with leading dot, empty when the name has none
    pub extension: String,
}

impl FileEntry {
    /// Builds an entry for `path` under `root`, reading its size from disk.
    ///
    /// Returns `None` when the path cannot be stat'ed or is not a regular
    /// file. Symbolic links are not followed and never yield an entry.
    #[must_use]
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let metadata = fs::symlink_metadata(path)
            .ok()
            .filter(fs::Metadata::is_file)?;

        Some(Self {
            relative_path: relative_path(root, path),
            absolute_path: path.to_path_buf(),
            size_bytes: metadata.len(),
            extension: extension_of(path),
        })
    }

    /// Returns the bare file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Returns the lower-cased extension of `path` including its leading dot.
///
/// Dotfiles such as `.env` and names ending in a dot have no extension.
#[must_use]
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Renders `path` relative to `root` with `/` separators.
#[must_use]
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Decodes file bytes as text, dropping invalid UTF-8 sequences and
/// translating `\r\n` and lone `\r` line endings to `\n`.
#[must_use]
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }

    if !text.contains('\r') {
        return text;
    }

    text.replace("\r\n", "\n").replace('\r', "\n")
}
