use anyhow::Context;
use clap::{Parser, Subcommand};
use repo_digest::{
    load_descriptors, BatchRunner, Config, NoMetadata, Pipeline, PipelineOptions,
    DEFAULT_API_BASE, DEFAULT_CONFIG_PATH,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "repo-digest",
    version,
    author,
    about = "Turn a remote repository into a single LLM analysis request",
    long_about = "Clone a repository, keep its source files, and assemble them into one \
    analysis document that ends with a fixed set of instructions for a language model.\n\n\
    USAGE EXAMPLES:\n  \
      # Process one repository\n  \
      repo-digest process https://github.com/user/project\n\n  \
      # Choose the output name\n  \
      repo-digest process https://github.com/user/project -o project\n\n  \
      # Process a list of repositories\n  \
      repo-digest batch repos.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (JSON); missing file means built-in defaults
    #[arg(
        short,
        long,
        global = true,
        env = "REPO_DIGEST_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        value_name = "FILE"
    )]
    config: PathBuf,

    /// Directory receiving analysis documents and batch results
    #[arg(long, global = true, default_value = "output", value_name = "PATH")]
    output_dir: PathBuf,

    /// Directory for temporary working copies
    #[arg(long, global = true, default_value = "temp_repos", value_name = "PATH")]
    work_dir: PathBuf,

    /// Path to custom Tera template file
    ///
    /// The template receives `metadata`, `structure`, `tree`, `files`,
    /// `truncated` and `prompt`, and replaces the built-in layout.
    #[arg(long, global = true, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Base URL of the repository metadata API
    #[arg(long, global = true, default_value = DEFAULT_API_BASE, value_name = "URL")]
    api_base: String,

    /// Skip the remote metadata lookup
    #[arg(long, global = true)]
    no_metadata: bool,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a single repository
    Process {
        /// Repository URL
        repo_url: String,

        /// Output name (default: repository name plus a timestamp)
        #[arg(short, long, value_name = "NAME")]
        output_name: Option<String>,
    },

    /// Process every repository listed in a JSON file
    ///
    /// Format: [{"name": "project", "url": "https://github.com/user/project"}]
    Batch {
        /// Repository list
        #[arg(value_name = "FILE")]
        list: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    execute(cli)
}

/// Runs the selected command.
///
/// Only configuration and pipeline construction errors are returned;
/// repository and batch failures are reported on stdout.
fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config).context("Failed to load configuration")?;

    let mut options = PipelineOptions::default()
        .output_dir(cli.output_dir)
        .work_dir(cli.work_dir)
        .api_base(cli.api_base);
    if let Some(template_path) = cli.template {
        options = options.template_path(template_path);
    }

    let mut pipeline = Pipeline::new(config, options).context("Failed to create pipeline")?;
    if cli.no_metadata {
        pipeline = pipeline.with_metadata_source(NoMetadata);
    }

    match cli.command {
        Command::Process {
            repo_url,
            output_name,
        } => {
            if let Some(output_file) = pipeline.process(&repo_url, output_name.as_deref()) {
                println!("\n✅ Processing complete!");
                println!("📄 Analysis file: {}", output_file.display());
                println!("\n🤖 Next step: submit the contents of this file to your LLM for analysis");
            } else {
                println!("\n❌ Processing failed");
            }
        }
        Command::Batch { list } => {
            if let Err(e) = run_batch(&pipeline, &list) {
                println!("❌ Batch processing failed: {e:#}");
            }
        }
    }

    Ok(())
}

fn run_batch(pipeline: &Pipeline, list: &Path) -> anyhow::Result<()> {
    let descriptors = load_descriptors(list).context("Failed to load repository list")?;
    println!("🚀 Starting batch processing of {} repositories...", descriptors.len());

    let summary = BatchRunner::new(pipeline)
        .run(&descriptors)
        .context("Failed to save batch results")?;

    println!("\n✅ Batch processing complete!");
    println!(
        "📊 Results: {}/{} successful",
        summary.successful(),
        summary.total()
    );
    println!("📁 Results saved to: {}", summary.results_file.display());

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("repo_digest=info"),
        1 => EnvFilter::new("repo_digest=debug"),
        _ => EnvFilter::new("repo_digest=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
