use crate::error::{Error, Result};
use globset::GlobBuilder;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Ignore globs applied when no configuration file overrides them.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "*.pyc",
    "*.pyo",
    "*.pyd",
    "__pycache__",
    "node_modules",
    ".git",
    ".vscode",
    ".idea",
    "*.log",
    "*.tmp",
    "*.temp",
    "*.cache",
    ".env",
    ".env.*",
    "*.key",
    "*.pem",
    "dist",
    "build",
    "target",
    "bin",
    "obj",
    "*.min.js",
    "*.min.css",
    "*.map",
    "package-lock.json",
    "yarn.lock",
    "composer.lock",
    "*.jpg",
    "*.jpeg",
    "*.png",
    "*.gif",
    "*.svg",
    "*.mp4",
    "*.avi",
    "*.mov",
    "*.pdf",
    "*.zip",
];

/// Extensions embedded when no configuration file overrides them.
pub const DEFAULT_INCLUDE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".tsx", ".jsx", ".html", ".css", ".java", ".cpp", ".c", ".h", ".cs",
    ".php", ".rb", ".go", ".rs", ".swift", ".kt", ".scala", ".r", ".sql", ".json", ".yaml",
    ".yml", ".xml", ".md", ".txt", ".sh", ".bat", ".ps1", ".dockerfile",
];

/// Configuration file read when no other path is given.
pub const DEFAULT_CONFIG_PATH: &str = "scripts/config.json";

const DEFAULT_MAX_FILE_SIZE: u64 = 100_000;
const DEFAULT_MAX_TOTAL_SIZE: u64 = 5_000_000;

/// File selection settings for one run.
///
/// Built once at startup and shared by reference with every component.
/// Use [`Config::builder()`] or [`Config::load`] to construct one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Config {
    /// Shell-style globs matched against relative paths and path segments
    pub ignore_patterns: Vec<String>,

    /// Lower-cased extensions, each with a leading dot
    pub include_extensions: BTreeSet<String>,

    /// Largest individual file (bytes) that may be embedded
    pub max_file_size: u64,

    /// Budget (bytes) for all embedded file bodies together
    pub max_total_size: u64,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use repo_digest::Config;
    ///
    /// let config = Config::builder()
    ///     .include_extensions([".rs", "TOML"])
    ///     .max_total_size(1_000_000)
    ///     .build()
    ///     .expect("valid configuration");
    ///
    /// assert!(config.include_extensions.contains(".toml"));
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Loads the configuration file at `path`.
    ///
    /// A missing file yields the built-in defaults, and so does any key
    /// absent from the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, is not valid
    /// JSON of the expected shape, or contains an invalid glob.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No configuration at {}, using built-in defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        Self::from_json(&raw)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))
    }

    /// Parses a configuration from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the result fails validation.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(raw)?;

        let mut builder = Self::builder();
        if let Some(patterns) = file.ignore_patterns {
            builder = builder.ignore_patterns(patterns);
        }
        if let Some(extensions) = file.include_extensions {
            builder = builder.include_extensions(extensions);
        }
        if let Some(size) = file.max_file_size {
            builder = builder.max_file_size(size);
        }
        if let Some(size) = file.max_total_size {
            builder = builder.max_total_size(size);
        }

        builder.build()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An ignore pattern is not a valid glob
    /// - An extension is empty
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.ignore_patterns {
            GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| Error::invalid_pattern(pattern, e.kind().to_string()))?;
        }

        if self.include_extensions.iter().any(|ext| ext.len() < 2) {
            return Err(Error::config("include_extensions must not contain empty entries"));
        }

        Ok(())
    }

    /// Returns true if `extension` (lower-cased, with leading dot) is embedded.
    #[must_use]
    pub fn includes_extension(&self, extension: &str) -> bool {
        self.include_extensions.contains(extension)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            include_extensions: DEFAULT_INCLUDE_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
        }
    }
}

/// On-disk shape of the configuration file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    ignore_patterns: Option<Vec<String>>,
    include_extensions: Option<Vec<String>>,
    max_file_size: Option<u64>,
    max_total_size: Option<u64>,
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    ignore_patterns: Option<Vec<String>>,
    include_extensions: Option<BTreeSet<String>>,
    max_file_size: Option<u64>,
    max_total_size: Option<u64>,
}

impl ConfigBuilder {
    /// Replaces the ignore globs.
    #[must_use]
    pub fn ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the embedded extensions.
    ///
    /// Entries are lower-cased and given a leading dot when it is missing.
    #[must_use]
    pub fn include_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.include_extensions = Some(
            extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
        );
        self
    }

    /// Sets the per-file size ceiling in bytes.
    #[must_use]
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Sets the cumulative size budget in bytes.
    #[must_use]
    pub fn max_total_size(mut self, bytes: u64) -> Self {
        self.max_total_size = Some(bytes);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();

        let config = Config {
            ignore_patterns: self.ignore_patterns.unwrap_or(defaults.ignore_patterns),
            include_extensions: self.include_extensions.unwrap_or(defaults.include_extensions),
            max_file_size: self.max_file_size.unwrap_or(defaults.max_file_size),
            max_total_size: self.max_total_size.unwrap_or(defaults.max_total_size),
        };

        config.validate()?;
        Ok(config)
    }
}

fn normalize_extension(raw: &str) -> String {
    let ext = raw.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
