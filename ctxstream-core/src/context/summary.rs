//! Human-readable overview of a context file set, sent with the first part.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::types::ContextFile;

static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:fn|def|function|func)\s+\w+",
    )
    .expect("invalid regex")
});

static TYPE_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:abstract\s+)?(?:class|struct|enum|trait|interface)\s+\w+",
    )
    .expect("invalid regex")
});

/// Structural counts for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub lines: usize,
    pub bytes: usize,
    /// Function definitions found
    pub functions: usize,
    /// Class/struct/enum/trait/interface definitions found
    pub types: usize,
}

impl FileSummary {
    pub fn from_file(file: &ContextFile) -> Self {
        Self {
            path: file.path.clone(),
            lines: file.line_count(),
            bytes: file.byte_len(),
            functions: FUNCTION_DEF.find_iter(&file.content).count(),
            types: TYPE_DEF.find_iter(&file.content).count(),
        }
    }
}

/// Totals and per-file counts for a whole file set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub file_count: usize,
    pub total_lines: usize,
    pub total_bytes: usize,
    pub files: Vec<FileSummary>,
}

impl ContextSummary {
    pub fn from_files(files: &[ContextFile]) -> Self {
        let files: Vec<FileSummary> = files.iter().map(FileSummary::from_file).collect();
        Self {
            file_count: files.len(),
            total_lines: files.iter().map(|f| f.lines).sum(),
            total_bytes: files.iter().map(|f| f.bytes).sum(),
            files,
        }
    }

    /// Render the summary as plain text.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Context summary: {} files, {} lines, {}\n",
            self.file_count,
            self.total_lines,
            format_size(self.total_bytes)
        );
        for file in &self.files {
            out.push_str(&format!(
                "- {}: {} lines, {}",
                file.path,
                file.lines,
                format_size(file.bytes)
            ));
            if file.functions > 0 || file.types > 0 {
                out.push_str(&format!(
                    ", {} functions, {} types",
                    file.functions, file.types
                ));
            }
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Display for ContextSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

fn format_size(size: usize) -> String {
    if size < 1024 {
        format!("{} bytes", size)
    } else if size < 1024 * 1024 {
        format!("{:.1} KB", size as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
    }
}
