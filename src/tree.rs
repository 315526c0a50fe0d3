//! Directory-tree preview.
//!
//! The preview is best-effort: a lister that cannot produce anything returns
//! an empty list and the document simply shows an empty tree section.

use crate::file::relative_path;
use ignore::WalkBuilder;
use std::path::Path;
use tracing::debug;

/// Number of files sampled from the working copy.
pub const TREE_SAMPLE_SIZE: usize = 50;

/// Number of sampled files shown in the document.
pub const TREE_DISPLAY_LIMIT: usize = 20;

/// Produces a short listing of files under a repository root.
pub trait TreeLister {
    /// Returns up to `limit` paths relative to `root`.
    fn list(&self, root: &Path, limit: usize) -> Vec<String>;
}

/// Lists non-hidden files with the `ignore` walker, sorted by name.
///
/// No ignore files are honoured; only paths with a component starting with
/// `.` are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkTreeLister;

impl TreeLister for WalkTreeLister {
    fn list(&self, root: &Path, limit: usize) -> Vec<String> {
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(true)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        walker
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Tree preview skipped an entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .take(limit)
            .map(|entry| relative_path(root, entry.path()))
            .collect()
    }
}

/// Lister used when no preview is wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTreeLister;

impl TreeLister for NoTreeLister {
    fn list(&self, _root: &Path, _limit: usize) -> Vec<String> {
        Vec::new()
    }
}

/// Samples [`TREE_SAMPLE_SIZE`] files and keeps the first [`TREE_DISPLAY_LIMIT`].
#[must_use]
pub(crate) fn preview(lister: &dyn TreeLister, root: &Path) -> Vec<String> {
    let mut sample = lister.list(root, TREE_SAMPLE_SIZE);
    sample.truncate(TREE_DISPLAY_LIMIT);
    sample
}
