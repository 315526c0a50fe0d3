use crate::{
    error::{Error, Result},
    file::{relative_path, FileEntry},
    filter::FileSelector,
};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Lower-cased names of files that usually describe a project's build or purpose.
static MAIN_FILES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "readme.md",
        "package.json",
        "requirements.txt",
        "cargo.toml",
        "pom.xml",
        "build.gradle",
        "makefile",
    ]
    .into_iter()
    .collect()
});

/// Summary statistics for a working copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructureSummary {
    /// Number of files that passed the selector
    pub total_files: usize,

    /// Selected files per extension, ordered by extension
    pub file_type_counts: BTreeMap<String, usize>,

    /// Every directory below the root, in walk order
    pub directories: Vec<String>,

    /// Selected marker files such as `README.md` or `Cargo.toml`
    pub main_files: Vec<String>,
}

/// Walks a working copy once and summarises what it contains.
pub struct StructureAnalyzer<'a> {
    selector: &'a FileSelector,
}

impl<'a> StructureAnalyzer<'a> {
    /// Creates an analyzer that counts files accepted by `selector`.
    #[must_use]
    pub const fn new(selector: &'a FileSelector) -> Self {
        Self { selector }
    }

    /// Builds the [`StructureSummary`] for `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be read.
    pub fn analyze(&self, root: &Path) -> Result<StructureSummary> {
        let mut summary = StructureSummary::default();

        for entry in walk(root, self.selector, Pruning::Keep)? {
            if entry.depth() == 0 {
                continue;
            }

            if entry.file_type().is_dir() {
                summary.directories.push(relative_path(root, entry.path()));
                continue;
            }

            let Some(file) = self.selector.select(root, entry.path()) else {
                trace!("Not selected: {}", entry.path().display());
                continue;
            };

            summary.total_files += 1;
            *summary
                .file_type_counts
                .entry(file.extension.clone())
                .or_insert(0) += 1;

            if MAIN_FILES.contains(file.file_name().to_lowercase().as_str()) {
                summary.main_files.push(file.relative_path);
            }
        }

        debug!(
            "Structure of {}: {} files, {} directories, {} marker files",
            root.display(),
            summary.total_files,
            summary.directories.len(),
            summary.main_files.len()
        );

        Ok(summary)
    }
}

/// Lists the files under `root` accepted by `selector`, in walk order.
///
/// # Errors
///
/// Returns an error if `root` cannot be read.
pub(crate) fn selected_files(root: &Path, selector: &FileSelector) -> Result<Vec<FileEntry>> {
    Ok(walk(root, selector, Pruning::SkipIgnored)?
        .filter(|entry| entry.depth() > 0 && !entry.file_type().is_dir())
        .filter_map(|entry| selector.select(root, entry.path()))
        .collect())
}

/// Whether [`walk`] enters directories matching an ignore glob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pruning {
    /// Visit every directory
    Keep,
    /// Do not descend into ignored directories
    SkipIgnored,
}

/// Walks `root` in a stable order.
///
/// Within a directory the files come first, sorted by name, followed by the
/// subdirectories, also sorted by name. With [`Pruning::SkipIgnored`],
/// directories matching an ignore glob are not entered. Unreadable entries
/// below the root are logged and skipped.
pub(crate) fn walk<'a>(
    root: &'a Path,
    selector: &'a FileSelector,
    pruning: Pruning,
) -> Result<impl Iterator<Item = DirEntry> + 'a> {
    fs::read_dir(root).map_err(|e| Error::traversal(root, e.to_string()))?;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(move |entry| {
            pruning == Pruning::Keep
                || entry.depth() == 0
                || !entry.file_type().is_dir()
                || !selector.is_ignored(&relative_path(root, entry.path()))
        });

    Ok(walker.filter_map(|result| match result {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Walk error: {}", e);
            None
        }
    }))
}
