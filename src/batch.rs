//! Batch processing.
//!
//! Runs the [`Pipeline`] once per [`RepositoryDescriptor`], strictly in input
//! order, and persists one [`BatchResultEntry`] per descriptor to
//! `batch_results.json` in the output directory.

use crate::{
    acquire::repository_name,
    error::{Error, Result},
    pipeline::Pipeline,
    writer,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// File name of the aggregate results written after a batch.
pub const RESULTS_FILE_NAME: &str = "batch_results.json";

/// One unit of batch work.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct RepositoryDescriptor {
    /// Explicit output name
    pub name: Option<String>,

    /// Remote repository URL
    pub url: String,
}

#[derive(Deserialize)]
struct RawDescriptor {
    name: Option<String>,
    url: Option<String>,
    repo_url: Option<String>,
}

impl TryFrom<RawDescriptor> for RepositoryDescriptor {
    type Error = String;

    fn try_from(raw: RawDescriptor) -> std::result::Result<Self, Self::Error> {
        let url = raw
            .url
            .filter(|u| !u.is_empty())
            .or(raw.repo_url.filter(|u| !u.is_empty()))
            .ok_or_else(|| "repository entry has neither `url` nor `repo_url`".to_string())?;

        Ok(Self {
            name: raw.name.filter(|n| !n.is_empty()),
            url,
        })
    }
}

impl RepositoryDescriptor {
    /// Creates a descriptor for `url` without an explicit name.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: None,
            url: url.into(),
        }
    }

    /// Sets the explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The explicit name, else the last URL segment without `.git`.
    #[must_use]
    pub fn resolved_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| repository_name(&self.url))
    }
}

/// Reads a JSON array of descriptors from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a JSON array, or an
/// entry carries no URL.
pub fn load_descriptors(path: impl AsRef<Path>) -> Result<Vec<RepositoryDescriptor>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

    serde_json::from_str(&raw)
        .map_err(|e| Error::config(format!("{}: invalid repository list: {e}", path.display())))
}

/// Outcome of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResultEntry {
    /// Resolved repository name
    pub repo_name: String,

    /// Repository URL as given
    pub repo_url: String,

    /// Written document, empty when the run failed
    pub output_file: String,

    /// Whether a document was written
    pub success: bool,
}

/// Results of a whole batch.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Entries in descriptor order
    pub entries: Vec<BatchResultEntry>,

    /// Where the entries were persisted
    pub results_file: PathBuf,
}

impl BatchSummary {
    /// Number of successful entries.
    #[must_use]
    pub fn successful(&self) -> usize {
        self.entries.iter().filter(|e| e.success).count()
    }

    /// Total number of entries.
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.len()
    }
}

/// Drives a [`Pipeline`] over a list of repositories.
pub struct BatchRunner<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> BatchRunner<'a> {
    /// Creates a runner using `pipeline` for every repository.
    #[must_use]
    pub const fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }

    /// Processes every descriptor and records its outcome.
    ///
    /// A failing repository never stops the batch.
    pub fn process_all(&self, descriptors: &[RepositoryDescriptor]) -> Vec<BatchResultEntry> {
        let total = descriptors.len();
        info!("Starting batch processing of {} repositories", total);

        descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let repo_name = descriptor.resolved_name();
                info!("Processing {}/{}: {}", index + 1, total, repo_name);

                let output = self.pipeline.process(&descriptor.url, Some(&repo_name));
                if output.is_none() {
                    warn!("Repository {} failed", repo_name);
                }

                BatchResultEntry {
                    repo_name,
                    repo_url: descriptor.url.clone(),
                    success: output.is_some(),
                    output_file: output
                        .map(|path| path.display().to_string())
                        .unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Processes every descriptor, then writes the results file.
    ///
    /// # Errors
    ///
    /// Returns an error only if the results file cannot be written.
    #[instrument(skip_all, fields(repositories = descriptors.len()))]
    pub fn run(&self, descriptors: &[RepositoryDescriptor]) -> Result<BatchSummary> {
        let entries = self.process_all(descriptors);

        let results_file = self.pipeline.output_dir().join(RESULTS_FILE_NAME);
        writer::write_json(&results_file, &entries)?;

        let summary = BatchSummary {
            entries,
            results_file,
        };
        info!(
            "Batch complete: {}/{} successful",
            summary.successful(),
            summary.total()
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{test_pipeline, FixtureAcquirer};
    use assert_fs::prelude::*;

    #[test]
    fn test_descriptor_accepts_url_alias() {
        let descriptors: Vec<RepositoryDescriptor> = serde_json::from_str(
            r#"[
                {"name": "awesome-project", "url": "https://github.com/user/awesome-project"},
                {"repo_url": "https://github.com/user/cool-app.git"},
                {"name": "", "url": "https://github.com/user/third"}
            ]"#,
        )
        .unwrap();

        assert_eq!(descriptors[0].resolved_name(), "awesome-project");
        assert_eq!(descriptors[1].url, "https://github.com/user/cool-app.git");
        assert_eq!(descriptors[1].resolved_name(), "cool-app");
        assert_eq!(descriptors[2].name, None);
        assert_eq!(descriptors[2].resolved_name(), "third");
    }

    #[test]
    fn test_descriptor_without_url_is_rejected() {
        let result: serde_json::Result<Vec<RepositoryDescriptor>> =
            serde_json::from_str(r#"[{"name": "orphan"}]"#);

        assert!(result.is_err());
    }

    #[test]
    fn test_load_descriptors_reports_path() {
        let temp = assert_fs::TempDir::new().unwrap();
        let list = temp.child("repos.json");
        list.write_str("{\"not\": \"a list\"}").unwrap();

        let err = load_descriptors(list.path()).unwrap_err();

        assert!(err.is_config());
        assert!(err.to_string().contains("repos.json"));
        assert!(load_descriptors(temp.path().join("absent.json"))
            .unwrap_err()
            .is_io());
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let temp = assert_fs::TempDir::new().unwrap();
        let failing = "https://github.com/octo/second";
        let pipeline = test_pipeline(temp.path(), FixtureAcquirer::failing_for(&[failing]));
        let descriptors = vec![
            RepositoryDescriptor::new("https://github.com/octo/first").named("first"),
            RepositoryDescriptor::new(failing),
            RepositoryDescriptor::new("https://github.com/octo/third.git"),
        ];

        let summary = BatchRunner::new(&pipeline).run(&descriptors).unwrap();

        let flags: Vec<bool> = summary.entries.iter().map(|e| e.success).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(summary.successful(), 2);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.entries[1].repo_name, "second");
        assert_eq!(summary.entries[1].output_file, "");

        assert!(temp.child("output/first_analysis.txt").path().exists());
        assert!(temp.child("output/third_analysis.txt").path().exists());
        assert!(!temp.child("output/second_analysis.txt").path().exists());
        assert!(!temp.path().join("temp_repos/second").exists());
    }

    #[test]
    fn test_escaping_name_fails_only_its_entry() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("keep/data.txt").write_str("keep").unwrap();
        let pipeline = test_pipeline(temp.path(), FixtureAcquirer::default());
        let descriptors = vec![
            RepositoryDescriptor::new("https://github.com/octo/evil").named("../keep"),
            RepositoryDescriptor::new("https://github.com/octo/good"),
        ];

        let summary = BatchRunner::new(&pipeline).run(&descriptors).unwrap();

        let flags: Vec<bool> = summary.entries.iter().map(|e| e.success).collect();
        assert_eq!(flags, vec![false, true]);
        temp.child("keep/data.txt").assert("keep");
    }

    #[test]
    fn test_results_file_is_written() {
        let temp = assert_fs::TempDir::new().unwrap();
        let pipeline = test_pipeline(temp.path(), FixtureAcquirer::default());
        let descriptors = vec![RepositoryDescriptor::new("https://github.com/octo/demo")];

        let summary = BatchRunner::new(&pipeline).run(&descriptors).unwrap();

        assert_eq!(summary.results_file, temp.path().join("output/batch_results.json"));
        let written: Vec<BatchResultEntry> =
            serde_json::from_str(&std::fs::read_to_string(&summary.results_file).unwrap())
                .unwrap();
        assert_eq!(written, summary.entries);
        assert_eq!(written[0].repo_name, "demo");
        assert!(written[0].output_file.ends_with("demo_analysis.txt"));
    }

    #[test]
    fn test_empty_batch_writes_empty_array() {
        let temp = assert_fs::TempDir::new().unwrap();
        let pipeline = test_pipeline(temp.path(), FixtureAcquirer::default());

        let summary = BatchRunner::new(&pipeline).run(&[]).unwrap();

        assert_eq!(summary.total(), 0);
        temp.child("output/batch_results.json").assert("[]");
    }
}
