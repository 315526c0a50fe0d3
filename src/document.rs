//! Analysis document assembly.
//!
//! The document is a fixed sequence of sections: banner, optional metadata,
//! structure summary, tree preview, embedded file bodies and the trailing
//! analysis prompt. Its exact text is the format downstream consumers parse,
//! so [`AnalysisDocument`]'s `Display` output must stay byte-stable.

use crate::{
    error::Result,
    file::{decode_text, FileEntry},
    filter::FileSelector,
    metadata::{MetadataField, RepositoryMetadata},
    scanner::{self, StructureSummary},
    tree::{self, TreeLister},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Instructions appended verbatim to every document.
pub const ANALYSIS_PROMPT: &str = "
Please analyze this repository and provide:

1. PROJECT OVERVIEW:
   - What does this project do?
   - What is the main technology stack?
   - What is the complexity level (Beginner/Intermediate/Advanced)?

2. LEARNING PATH:
   - Break down the project into 4-6 learning steps
   - For each step, provide:
     * Title
     * Description (what the learner will build/learn)
     * Estimated time
     * Key concepts covered
     * Specific files/components to focus on

3. TECHNICAL ANALYSIS:
   - Key technologies and frameworks used
   - Dependencies and requirements
   - Architecture patterns
   - Estimated hours to complete for different skill levels

4. LEARNING OBJECTIVES:
   - What skills will the learner gain?
   - What concepts will they understand?
   - How does this project help their development journey?

5. XP REWARD CALCULATION:
   - Based on complexity, tech stack, and learning value
   - Suggest XP reward (base: Beginner=100, Intermediate=250, Advanced=500)

Please format your response in a structured way that can be easily parsed and integrated into a learning platform.
        ";

const HEAVY_RULE_WIDTH: usize = 80;
const LIGHT_RULE_WIDTH: usize = 40;

/// Body of one file in the contents section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileBody {
    /// Decoded text
    Text {
        /// File content
        content: String,
    },

    /// The file could not be read; the document records why.
    Unreadable {
        /// Error message
        message: String,
    },
}

/// A file placed in the contents section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedFile {
    /// Path relative to the repository root
    pub relative_path: String,

    /// Size measured before reading
    pub size_bytes: u64,

    /// Content or read failure
    pub body: FileBody,
}

/// The assembled analysis request, before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisDocument {
    /// Remote metadata, when the lookup found any
    pub metadata: Option<RepositoryMetadata>,

    /// Structure summary of the working copy
    pub structure: StructureSummary,

    /// Tree preview, relative paths
    pub tree: Vec<String>,

    /// Embedded files in walk order
    pub files: Vec<EmbeddedFile>,

    /// True when the size budget stopped the contents section early
    pub truncated: bool,

    /// Trailing instructions
    pub prompt: &'static str,
}

impl AnalysisDocument {
    /// Total measured size of the files whose content was embedded.
    #[must_use]
    pub fn embedded_bytes(&self) -> u64 {
        self.files
            .iter()
            .filter(|f| matches!(f.body, FileBody::Text { .. }))
            .map(|f| f.size_bytes)
            .sum()
    }

    fn lines(&self) -> Vec<String> {
        let heavy = "=".repeat(HEAVY_RULE_WIDTH);
        let light = "-".repeat(LIGHT_RULE_WIDTH);

        let mut lines = vec![
            heavy.clone(),
            "REPOSITORY ANALYSIS REQUEST".to_string(),
            heavy.clone(),
            String::new(),
        ];

        if let Some(metadata) = self.metadata.as_ref().filter(|m| !m.is_empty()) {
            lines.push(format!("Repository: {}", field(&metadata.full_name, "Unknown")));
            lines.push(format!(
                "Description: {}",
                field(&metadata.description, "No description")
            ));
            lines.push(format!("Language: {}", field(&metadata.language, "Unknown")));
            lines.push(format!("Stars: {}", field(&metadata.star_count, "0")));
            lines.push(format!("Forks: {}", field(&metadata.fork_count, "0")));
            lines.push(String::new());
        }

        lines.push("REPOSITORY STRUCTURE:".to_string());
        lines.push(light.clone());
        lines.push(format!(
            "Total files to analyze: {}",
            self.structure.total_files
        ));
        lines.push(format!(
            "File types: {}",
            literal_dict(&self.structure.file_type_counts)
        ));
        lines.push(format!(
            "Main configuration files: {}",
            literal_list(&self.structure.main_files)
        ));
        lines.push(String::new());

        lines.push("DIRECTORY TREE:".to_string());
        lines.push(light.clone());
        lines.extend(self.tree.iter().map(|path| format!("  {path}")));
        lines.push(String::new());

        lines.push("FILE CONTENTS:".to_string());
        lines.push(light);
        for file in &self.files {
            let path = &file.relative_path;
            match &file.body {
                FileBody::Text { content } => {
                    lines.push(format!("\n--- FILE: {path} ---"));
                    lines.push(content.clone());
                    lines.push(format!("--- END OF {path} ---\n"));
                }
                FileBody::Unreadable { message } => {
                    lines.push(format!("\n--- ERROR reading {path}: {message} ---\n"));
                }
            }
        }
        if self.truncated {
            lines.push("\n... (truncated - size limit reached)".to_string());
        }

        lines.push(format!("\n{heavy}"));
        lines.push("ANALYSIS REQUEST".to_string());
        lines.push(heavy);
        lines.push(self.prompt.to_string());

        lines
    }
}

impl fmt::Display for AnalysisDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// Builds [`AnalysisDocument`]s for working copies.
pub struct DocumentAssembler<'a> {
    selector: &'a FileSelector,
    lister: &'a dyn TreeLister,
    max_total_size: u64,
}

impl<'a> DocumentAssembler<'a> {
    /// Creates an assembler embedding files accepted by `selector` until
    /// `max_total_size` bytes have been used.
    #[must_use]
    pub fn new(selector: &'a FileSelector, lister: &'a dyn TreeLister, max_total_size: u64) -> Self {
        Self {
            selector,
            lister,
            max_total_size,
        }
    }

    /// Collects every section of the document for `root`.
    ///
    /// Files are embedded in walk order until the next one would push the
    /// running total of measured sizes past the budget; the document is then
    /// marked truncated and nothing further is embedded. A file that cannot
    /// be read is recorded as [`FileBody::Unreadable`] and does not count
    /// against the budget.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be walked.
    pub fn collect(
        &self,
        root: &Path,
        metadata: Option<&RepositoryMetadata>,
        structure: &StructureSummary,
    ) -> Result<AnalysisDocument> {
        let mut files = Vec::new();
        let mut total_size = 0u64;
        let mut truncated = false;

        for entry in scanner::selected_files(root, self.selector)? {
            if total_size + entry.size_bytes > self.max_total_size {
                debug!(
                    "Size limit reached at {} ({} bytes embedded)",
                    entry.relative_path, total_size
                );
                truncated = true;
                break;
            }

            let body = read_body(&entry);
            if matches!(body, FileBody::Text { .. }) {
                total_size += entry.size_bytes;
            }

            files.push(EmbeddedFile {
                relative_path: entry.relative_path,
                size_bytes: entry.size_bytes,
                body,
            });
        }

        Ok(AnalysisDocument {
            metadata: metadata.cloned(),
            structure: structure.clone(),
            tree: tree::preview(self.lister, root),
            files,
            truncated,
            prompt: ANALYSIS_PROMPT,
        })
    }

    /// Assembles the document for `root` and renders it as text.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be walked.
    pub fn assemble(
        &self,
        root: &Path,
        metadata: Option<&RepositoryMetadata>,
        structure: &StructureSummary,
    ) -> Result<String> {
        Ok(self.collect(root, metadata, structure)?.to_string())
    }
}

fn read_body(entry: &FileEntry) -> FileBody {
    match fs::read(&entry.absolute_path) {
        Ok(bytes) => FileBody::Text {
            content: decode_text(&bytes),
        },
        Err(e) => {
            warn!("Failed to read {}: {}", entry.relative_path, e);
            FileBody::Unreadable {
                message: e.to_string(),
            }
        }
    }
}

/// The placeholder when the key was missing, `None` for an explicit `null`.
fn field<T: fmt::Display>(value: &MetadataField<T>, missing: &str) -> String {
    match value {
        None => missing.to_string(),
        Some(None) => "None".to_string(),
        Some(Some(value)) => value.to_string(),
    }
}

/// Renders a string as a single-quoted literal, e.g. `'src/main.rs'`.
fn quoted(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() && (c as u32) < 0x100 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Renders `{'.md': 1, '.py': 2}`.
fn literal_dict(counts: &BTreeMap<String, usize>) -> String {
    let entries: Vec<String> = counts
        .iter()
        .map(|(key, count)| format!("{}: {count}", quoted(key)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Renders `['README.md', 'web/package.json']`.
fn literal_list(items: &[String]) -> String {
    let entries: Vec<String> = items.iter().map(|item| quoted(item)).collect();
    format!("[{}]", entries.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::scanner::StructureAnalyzer;
    use crate::tree::{NoTreeLister, WalkTreeLister};
    use assert_fs::prelude::*;

    fn render(root: &Path, config: &Config, metadata: Option<&RepositoryMetadata>) -> String {
        let selector = FileSelector::new(config).unwrap();
        let structure = StructureAnalyzer::new(&selector).analyze(root).unwrap();
        DocumentAssembler::new(&selector, &NoTreeLister, config.max_total_size)
            .assemble(root, metadata, &structure)
            .unwrap()
    }

    #[test]
    fn test_empty_repository_document() {
        let temp = assert_fs::TempDir::new().unwrap();

        let text = render(temp.path(), &Config::default(), None);

        let heavy = "=".repeat(80);
        let light = "-".repeat(40);
        let expected = format!(
            "{heavy}\nREPOSITORY ANALYSIS REQUEST\n{heavy}\n\n\
             REPOSITORY STRUCTURE:\n{light}\nTotal files to analyze: 0\nFile types: {{}}\n\
             Main configuration files: []\n\n\
             DIRECTORY TREE:\n{light}\n\n\
             FILE CONTENTS:\n{light}\n\n\
             {heavy}\nANALYSIS REQUEST\n{heavy}\n{ANALYSIS_PROMPT}"
        );
        assert_eq!(text, expected);
        assert!(text.ends_with(ANALYSIS_PROMPT));
    }

    #[test]
    fn test_selected_files_are_embedded() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str(&"#".repeat(50)).unwrap();
        temp.child("b.png").write_binary(&[7u8; 1000]).unwrap();
        temp.child(".git/config").write_str("[core]").unwrap();

        let text = render(temp.path(), &Config::default(), None);

        assert!(text.contains(&format!("\n--- FILE: a.py ---\n{}\n--- END OF a.py ---\n", "#".repeat(50))));
        assert!(text.contains("Total files to analyze: 1"));
        assert!(text.contains("File types: {'.py': 1}"));
        assert!(!text.contains("b.png"));
        assert!(!text.contains(".git/config"));
        assert!(!text.contains("[core]"));
    }

    #[test]
    fn test_file_types_are_sorted() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("z.py").write_str("").unwrap();
        temp.child("y.py").write_str("").unwrap();
        temp.child("README.md").write_str("# x").unwrap();
        temp.child("src/app.js").write_str("").unwrap();

        let text = render(temp.path(), &Config::default(), None);

        assert!(text.contains("File types: {'.js': 1, '.md': 1, '.py': 2}"));
        assert!(text.contains("Main configuration files: ['README.md']"));
    }

    #[test]
    fn test_truncation_stops_embedding() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.txt").write_str(&"a".repeat(40)).unwrap();
        temp.child("b.txt").write_str(&"b".repeat(40)).unwrap();
        temp.child("c.txt").write_str(&"c".repeat(40)).unwrap();
        temp.child("sub/d.txt").write_str("d").unwrap();
        let config = Config::builder().max_total_size(100).build().unwrap();
        let selector = FileSelector::new(&config).unwrap();
        let structure = StructureAnalyzer::new(&selector).analyze(temp.path()).unwrap();

        let document = DocumentAssembler::new(&selector, &NoTreeLister, 100)
            .collect(temp.path(), None, &structure)
            .unwrap();
        let text = document.to_string();

        assert!(document.truncated);
        assert_eq!(document.files.len(), 2);
        assert!(document.embedded_bytes() <= config.max_total_size);

        let marker = text.find("... (truncated - size limit reached)").unwrap();
        let tail = &text[marker..];
        assert!(!tail.contains("--- FILE:"));
        assert!(!text.contains("ccc"));
        assert!(!text.contains("sub/d.txt ---"));
        assert!(text.ends_with(ANALYSIS_PROMPT));
    }

    #[test]
    fn test_exact_budget_is_not_truncated() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.txt").write_str(&"a".repeat(60)).unwrap();
        temp.child("b.txt").write_str(&"b".repeat(40)).unwrap();
        let config = Config::builder().max_total_size(100).build().unwrap();

        let text = render(temp.path(), &config, None);

        assert!(text.contains("--- END OF b.txt ---"));
        assert!(!text.contains("truncated"));
    }

    #[test]
    fn test_metadata_lines_with_placeholders() {
        let temp = assert_fs::TempDir::new().unwrap();
        let metadata = RepositoryMetadata {
            full_name: Some(Some("octo/demo".to_string())),
            language: Some(Some("Rust".to_string())),
            star_count: Some(Some(12)),
            ..RepositoryMetadata::default()
        };

        let text = render(temp.path(), &Config::default(), Some(&metadata));

        assert!(text.contains(
            "\n\nRepository: octo/demo\nDescription: No description\nLanguage: Rust\n\
             Stars: 12\nForks: 0\n\nREPOSITORY STRUCTURE:"
        ));
    }

    #[test]
    fn test_null_metadata_renders_none() {
        let temp = assert_fs::TempDir::new().unwrap();
        let metadata: RepositoryMetadata = serde_json::from_str(
            r#"{"full_name":"octo/demo","description":null,"language":null,"stargazers_count":3}"#,
        )
        .unwrap();

        let text = render(temp.path(), &Config::default(), Some(&metadata));

        assert!(text.contains(
            "Repository: octo/demo\nDescription: None\nLanguage: None\nStars: 3\nForks: 0\n"
        ));
    }

    #[test]
    fn test_missing_metadata_omits_lines() {
        let temp = assert_fs::TempDir::new().unwrap();

        let without = render(temp.path(), &Config::default(), None);
        let empty = render(
            temp.path(),
            &Config::default(),
            Some(&RepositoryMetadata::default()),
        );

        assert!(!without.contains("Repository:"));
        assert!(!without.contains("Stars:"));
        assert_eq!(without, empty);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_targets_are_never_embedded() {
        let outside = assert_fs::TempDir::new().unwrap();
        let secret = outside.child("id_rsa.txt");
        secret.write_str("SECRET-KEY-MATERIAL").unwrap();
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.py").write_str("print('hi')").unwrap();
        temp.child("notes.txt").symlink_to_file(secret.path()).unwrap();

        let text = render(temp.path(), &Config::default(), None);

        assert!(text.contains("--- FILE: main.py ---"));
        assert!(text.contains("Total files to analyze: 1"));
        assert!(!text.contains("SECRET-KEY-MATERIAL"));
        assert!(!text.contains("--- FILE: notes.txt"));
    }

    #[test]
    fn test_unreadable_file_is_recorded() {
        let temp = assert_fs::TempDir::new().unwrap();
        let entry = FileEntry {
            relative_path: "gone.py".to_string(),
            absolute_path: temp.path().join("gone.py"),
            size_bytes: 10,
            extension: ".py".to_string(),
        };

        let body = read_body(&entry);
        assert!(matches!(body, FileBody::Unreadable { .. }));

        let document = AnalysisDocument {
            metadata: None,
            structure: StructureSummary::default(),
            tree: Vec::new(),
            files: vec![EmbeddedFile {
                relative_path: entry.relative_path.clone(),
                size_bytes: entry.size_bytes,
                body: FileBody::Unreadable {
                    message: "permission denied".to_string(),
                },
            }],
            truncated: false,
            prompt: ANALYSIS_PROMPT,
        };

        assert!(document
            .to_string()
            .contains("\n\n--- ERROR reading gone.py: permission denied ---\n\n"));
        assert_eq!(document.embedded_bytes(), 0);
    }

    #[test]
    fn test_tree_section_lists_preview() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main.rs").write_str("fn main() {}").unwrap();
        temp.child("logo.png").write_binary(&[1]).unwrap();
        let config = Config::default();
        let selector = FileSelector::new(&config).unwrap();
        let structure = StructureAnalyzer::new(&selector).analyze(temp.path()).unwrap();

        let text = DocumentAssembler::new(&selector, &WalkTreeLister, config.max_total_size)
            .assemble(temp.path(), None, &structure)
            .unwrap();

        assert!(text.contains("DIRECTORY TREE:\n----------------------------------------\n  logo.png\n  src/main.rs\n\nFILE CONTENTS:"));
    }

    #[test]
    fn test_contents_are_stable_across_runs() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/lib.rs").write_str("pub fn a() {}\r\n").unwrap();
        temp.child("docs/guide.md").write_str("# Guide\n").unwrap();
        temp.child("main.go").write_str("package main\n").unwrap();

        let first = render(temp.path(), &Config::default(), None);
        let second = render(temp.path(), &Config::default(), None);

        assert_eq!(first, second);
        assert!(first.contains("pub fn a() {}\n\n--- END OF src/lib.rs ---"));
    }

    #[test]
    fn test_quoted_literals() {
        assert_eq!(quoted("a.py"), "'a.py'");
        assert_eq!(quoted("it's.md"), "\"it's.md\"");
        assert_eq!(quoted("back\\slash"), "'back\\\\slash'");
        assert_eq!(literal_list(&[]), "[]");
        assert_eq!(
            literal_list(&["a".to_string(), "b/c".to_string()]),
            "['a', 'b/c']"
        );
    }
}
