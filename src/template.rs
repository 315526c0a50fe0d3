use crate::{
    document::AnalysisDocument,
    error::{Error, Result},
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tera::{Context, Tera, Value};

/// Renders an [`AnalysisDocument`] through a user-supplied Tera template.
///
/// The template sees the document's fields at the top level: `metadata`
/// (or `null`), `structure`, `tree`, `files` (each with `relative_path`,
/// `size_bytes` and a `body` whose `kind` is `text` or `unreadable`),
/// `truncated` and `prompt`.
pub(crate) struct TemplateEngine {
    tera: Tera,
    name: String,
}

impl TemplateEngine {
    /// Loads and parses the template at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid template.
    pub(crate) fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let name = path
            .file_name()
            .map_or_else(|| "custom".to_string(), |n| n.to_string_lossy().to_string());

        let mut tera = Tera::default();
        // File bodies are source code, never markup to escape
        tera.autoescape_on(Vec::new());
        Self::register_filters(&mut tera);
        tera.add_raw_template(&name, &source)
            .map_err(|e| Error::template(&name, &e))?;

        Ok(Self { tera, name })
    }

    /// Renders `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails at render time.
    pub(crate) fn render(&self, document: &AnalysisDocument) -> Result<String> {
        let context =
            Context::from_serialize(document).map_err(|e| Error::template(&self.name, &e))?;

        self.tera
            .render(&self.name, &context)
            .map_err(|e| Error::template(&self.name, &e))
    }

    fn register_filters(tera: &mut Tera) {
        tera.register_filter("detect_language", Self::detect_language_filter);
        tera.register_filter("truncate_lines", Self::truncate_lines_filter);
    }

    /// Maps a file path to a code-fence language tag.
    fn detect_language_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let Some(path) = value.as_str() else {
            return Ok(value.clone());
        };

        let extension = path.rsplit_once('.').map_or("", |(_, ext)| ext);
        let language = match extension.to_lowercase().as_str() {
            "rs" => "rust",
            "py" => "python",
            "js" | "jsx" => "javascript",
            "ts" | "tsx" => "typescript",
            "go" => "go",
            "java" => "java",
            "c" | "h" => "c",
            "cpp" => "cpp",
            "cs" => "csharp",
            "rb" => "ruby",
            "php" => "php",
            "swift" => "swift",
            "kt" => "kotlin",
            "scala" => "scala",
            "r" => "r",
            "sql" => "sql",
            "sh" => "bash",
            "bat" => "batch",
            "ps1" => "powershell",
            "html" => "html",
            "css" => "css",
            "json" => "json",
            "yaml" | "yml" => "yaml",
            "xml" => "xml",
            "md" => "markdown",
            "dockerfile" => "dockerfile",
            _ => "",
        };

        Ok(Value::String(language.to_string()))
    }

    /// Keeps the first `max` lines (default 1000) of a string.
    fn truncate_lines_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let max_lines = args
            .get("max")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(1000);

        let Some(text) = value.as_str() else {
            return Ok(value.clone());
        };

        let total = text.lines().count();
        if total <= max_lines {
            return Ok(value.clone());
        }

        let kept: Vec<&str> = text.lines().take(max_lines).collect();
        Ok(Value::String(format!(
            "{}\n... ({} more lines omitted)",
            kept.join("\n"),
            total - max_lines
        )))
    }
}
