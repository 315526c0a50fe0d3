use crate::{
    acquire::{repository_name, GitCli, RepositoryAcquirer, WorkingCopy},
    config::Config,
    document::DocumentAssembler,
    error::{Error, Result},
    filter::FileSelector,
    metadata::{GitHubMetadata, MetadataLookup, MetadataSource, DEFAULT_API_BASE},
    scanner::StructureAnalyzer,
    template::TemplateEngine,
    tree::{TreeLister, WalkTreeLister},
    writer,
};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

const OUTPUT_SUFFIX: &str = "_analysis.txt";

/// Run-level settings that sit outside file selection.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PipelineOptions {
    /// Directory receiving analysis documents and batch results
    pub output_dir: PathBuf,

    /// Directory under which working copies are created and removed
    pub work_dir: PathBuf,

    /// Tera template replacing the built-in document layout
    pub template_path: Option<PathBuf>,

    /// Base URL of the metadata REST API
    pub api_base: String,
}

impl PipelineOptions {
    /// Sets the output directory.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Sets the working-copy directory.
    #[must_use]
    pub fn work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_dir = path.into();
        self
    }

    /// Renders documents through the template at `path`.
    #[must_use]
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Sets the metadata API base URL.
    #[must_use]
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            work_dir: PathBuf::from("temp_repos"),
            template_path: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Statistics for one processed repository.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Written analysis document
    pub output_file: PathBuf,

    /// Files counted by the structure analysis
    pub total_files: usize,

    /// Files whose content was embedded
    pub embedded_files: usize,

    /// Whether the size budget cut the contents section short
    pub truncated: bool,

    /// Whether remote metadata was found
    pub metadata_found: bool,

    /// Size of the written document in bytes
    pub document_bytes: usize,

    /// Total execution time
    pub duration: Duration,
}

/// Sequences acquisition, metadata lookup, analysis, assembly, persistence
/// and cleanup for one repository at a time.
pub struct Pipeline {
    config: Config,
    options: PipelineOptions,
    selector: FileSelector,
    acquirer: Box<dyn RepositoryAcquirer>,
    metadata: Box<dyn MetadataSource>,
    lister: Box<dyn TreeLister>,
    template: Option<TemplateEngine>,
}

impl Pipeline {
    /// Creates a pipeline that clones with `git`, looks metadata up on the
    /// public REST API and previews trees with [`WalkTreeLister`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The template cannot be loaded
    /// - The HTTP client cannot be initialised
    pub fn new(config: Config, options: PipelineOptions) -> Result<Self> {
        config.validate()?;

        let selector = FileSelector::new(&config)?;
        let template = options
            .template_path
            .as_deref()
            .map(TemplateEngine::from_file)
            .transpose()?;
        let metadata = GitHubMetadata::new(options.api_base.as_str())?;

        Ok(Self {
            config,
            options,
            selector,
            acquirer: Box::new(GitCli::new()),
            metadata: Box::new(metadata),
            lister: Box::new(WalkTreeLister),
            template,
        })
    }

    /// Replaces the repository acquirer.
    #[must_use]
    pub fn with_acquirer(mut self, acquirer: impl RepositoryAcquirer + 'static) -> Self {
        self.acquirer = Box::new(acquirer);
        self
    }

    /// Replaces the metadata source.
    #[must_use]
    pub fn with_metadata_source(mut self, source: impl MetadataSource + 'static) -> Self {
        self.metadata = Box::new(source);
        self
    }

    /// Replaces the tree-preview lister.
    #[must_use]
    pub fn with_tree_lister(mut self, lister: impl TreeLister + 'static) -> Self {
        self.lister = Box::new(lister);
        self
    }

    /// Returns the file-selection configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the directory receiving output files.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.options.output_dir
    }

    /// Processes one repository, logging instead of returning failures.
    ///
    /// Returns the path of the written document, or `None` if any stage failed.
    pub fn process(&self, repo_url: &str, output_name: Option<&str>) -> Option<PathBuf> {
        match self.run(repo_url, output_name) {
            Ok(stats) => Some(stats.output_file),
            Err(e) => {
                error!("Error processing repository: {}", e);
                None
            }
        }
    }

    /// Executes every stage for `repo_url` and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **Acquire**: shallow copy into `<work_dir>/<output_name>`
    /// 2. **Metadata**: best-effort lookup, never fatal
    /// 3. **Assemble**: structure analysis and document assembly
    /// 4. **Persist**: write `<output_dir>/<output_name>_analysis.txt`
    ///
    /// The working copy is removed on every exit path, and before this
    /// method returns.
    ///
    /// When `output_name` is `None` it is derived from the URL plus a
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the output name is not a single path segment, or
    /// if acquisition, traversal, rendering or the write fails.
    #[instrument(skip(self))]
    pub fn run(&self, repo_url: &str, output_name: Option<&str>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let output_name = output_name.map_or_else(|| default_output_name(repo_url), str::to_string);

        info!("Processing repository: {}", repo_url);
        validate_output_name(&output_name)?;

        let working_copy = WorkingCopy::new(self.options.work_dir.join(&output_name));

        // Stage 1: Acquisition
        self.acquirer.acquire(repo_url, working_copy.path())?;

        // Stage 2: Metadata
        let lookup = self.metadata.fetch(repo_url);
        if let MetadataLookup::Unavailable { reason } = &lookup {
            info!("Continuing without repository metadata ({})", reason);
        }

        // Stage 3: Analysis and assembly
        let root = working_copy.path();
        let structure = StructureAnalyzer::new(&self.selector).analyze(root)?;
        let document = DocumentAssembler::new(
            &self.selector,
            self.lister.as_ref(),
            self.config.max_total_size,
        )
        .collect(root, lookup.metadata(), &structure)?;
        debug!(
            "Embedded {} of {} files ({} bytes)",
            document.files.len(),
            structure.total_files,
            document.embedded_bytes()
        );

        let text = match &self.template {
            Some(template) => template.render(&document)?,
            None => document.to_string(),
        };

        // Stage 4: Persistence
        let output_file = self
            .options
            .output_dir
            .join(format!("{output_name}{OUTPUT_SUFFIX}"));
        writer::write_atomic(&output_file, text.as_bytes())?;

        drop(working_copy);

        #[allow(clippy::cast_precision_loss)]
        let size_kb = text.len() as f64 / 1024.0;
        info!("✓ Analysis file created: {}", output_file.display());
        info!("✓ File size: {:.1} KB", size_kb);

        Ok(PipelineStats {
            output_file,
            total_files: structure.total_files,
            embedded_files: document.files.len(),
            truncated: document.truncated,
            metadata_found: lookup.metadata().is_some(),
            document_bytes: text.len(),
            duration: start_time.elapsed(),
        })
    }
}

/// Rejects names that would place the working copy or the document outside
/// their directories, such as `../x`, `a/b` or absolute paths.
fn validate_output_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) if segment.to_str() == Some(name) => Ok(()),
        _ => Err(Error::invalid_name(name, "must be a single path segment")),
    }
}

/// `<repository name>_<YYYYmmdd_HHMMSS>`
fn default_output_name(repo_url: &str) -> String {
    format!(
        "{}_{}",
        repository_name(repo_url),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}
