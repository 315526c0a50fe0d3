//! # repo-digest
//!
//! Turns a remote source repository into a single plain-text analysis request
//! for a large language model.
//!
//! ## Features
//!
//! - Shallow acquisition with `git clone --depth 1`, removed after every run
//! - Ignore globs, extension allow-list and per-file size ceiling
//! - Total size budget with an explicit truncation marker
//! - Optional repository metadata header from the public REST API
//! - Optional Tera template replacing the built-in layout
//! - Batch processing with a JSON results file
//!
//! ## Quick Start
//!
//! ```no_run
//! use repo_digest::{Config, Pipeline, PipelineOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .max_total_size(2_000_000)
//!     .build()?;
//!
//! let stats = Pipeline::new(config, PipelineOptions::default())?
//!     .run("https://github.com/user/project", Some("project"))?;
//! println!("{}", stats.output_file.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Each run is a fixed sequence of stages:
//! 1. **Acquire**: shallow working copy under the work directory
//! 2. **Metadata**: best-effort lookup, never fatal
//! 3. **Scan**: file selection and structure summary
//! 4. **Assemble**: document sections, file bodies and the analysis prompt
//! 5. **Persist**: atomic write, then the working copy is removed

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod acquire;
mod batch;
mod config;
mod document;
mod error;
mod file;
mod filter;
mod metadata;
mod pipeline;
mod scanner;
mod template;
mod tree;
mod writer;

pub use acquire::{repository_name, GitCli, RepositoryAcquirer, WorkingCopy};
pub use batch::{
    load_descriptors, BatchResultEntry, BatchRunner, BatchSummary, RepositoryDescriptor,
    RESULTS_FILE_NAME,
};
pub use config::{
    Config, ConfigBuilder, DEFAULT_CONFIG_PATH, DEFAULT_IGNORE_PATTERNS, DEFAULT_INCLUDE_EXTENSIONS,
};
pub use document::{AnalysisDocument, DocumentAssembler, EmbeddedFile, FileBody, ANALYSIS_PROMPT};
pub use error::{Error, Result};
pub use file::FileEntry;
pub use filter::FileSelector;
pub use metadata::{
    parse_owner_repo, GitHubMetadata, MetadataField, MetadataLookup, MetadataSource, NoMetadata,
    RepositoryMetadata, DEFAULT_API_BASE,
};
pub use pipeline::{Pipeline, PipelineOptions, PipelineStats};
pub use scanner::{StructureAnalyzer, StructureSummary};
pub use tree::{NoTreeLister, TreeLister, WalkTreeLister, TREE_DISPLAY_LIMIT, TREE_SAMPLE_SIZE};

/// Processes one repository with the built-in collaborators.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The repository cannot be acquired
/// - The working copy cannot be walked
/// - The document cannot be written
///
/// # Examples
///
/// ```no_run
/// use repo_digest::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// run(Config::load("scripts/config.json")?, "https://github.com/user/project")?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config, repo_url: &str) -> Result<PipelineStats> {
    Pipeline::new(config, PipelineOptions::default())?.run(repo_url, None)
}
