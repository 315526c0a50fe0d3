//! File selection.
//!
//! Decides which files of a working copy take part in the analysis document,
//! using the ignore globs, extension allow-list and size ceiling from [`Config`].

use crate::config::Config;
use crate::error::{Error, Result};
use crate::file::FileEntry;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::Path;

/// Per-file inclusion predicate compiled from a [`Config`].
#[derive(Debug, Clone)]
pub struct FileSelector {
    ignore: GlobSet,
    include_extensions: BTreeSet<String>,
    max_file_size: u64,
}

impl FileSelector {
    /// Compiles the selector for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore pattern is not a valid glob.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            ignore: Self::build_globset(&config.ignore_patterns)?,
            include_extensions: config.include_extensions.clone(),
            max_file_size: config.max_file_size,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| Error::invalid_pattern(pattern, e.kind().to_string()))?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    /// Returns true if `relative_path` matches an ignore glob.
    ///
    /// The globs are tried against the whole path, every ancestor of it, and
    /// the bare name of each of those, so `node_modules` also rejects
    /// `web/node_modules/react/index.js`.
    #[must_use]
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        Path::new(relative_path)
            .ancestors()
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .any(|ancestor| {
                self.ignore.is_match(ancestor)
                    || ancestor
                        .file_name()
                        .is_some_and(|name| self.ignore.is_match(name))
            })
    }

    /// Returns true if the file at `path` takes part in the output.
    ///
    /// A path whose size cannot be read, or that is not a regular file, is
    /// excluded. Symbolic links count as non-regular, whatever they point to.
    #[must_use]
    pub fn should_include(&self, path: &Path, relative_path: &str) -> bool {
        self.passes_name_rules(path, relative_path)
            && std::fs::symlink_metadata(path)
                .is_ok_and(|m| m.is_file() && m.len() <= self.max_file_size)
    }

    /// Returns the entry for `path` when it passes every rule.
    ///
    /// Equivalent to [`FileSelector::should_include`] but keeps the measured size.
    #[must_use]
    pub fn select(&self, root: &Path, path: &Path) -> Option<FileEntry> {
        let relative_path = crate::file::relative_path(root, path);
        if !self.passes_name_rules(path, &relative_path) {
            return None;
        }

        FileEntry::from_path(root, path).filter(|entry| entry.size_bytes <= self.max_file_size)
    }

    fn passes_name_rules(&self, path: &Path, relative_path: &str) -> bool {
        if self.is_ignored(relative_path) {
            return false;
        }

        if let Some(name) = path.file_name() {
            if self.ignore.is_match(name) {
                return false;
            }
        }

        let extension = crate::file::extension_of(path);
        !extension.is_empty() && self.include_extensions.contains(&extension)
    }
}
