//! Diff processor: unified-diff text in, reviewable chunks out.
//!
//! A chunk is one hunk's changed lines plus up to `context_lines` unchanged
//! lines around each addition, deduplicated by original position and capped
//! at [`CHUNK_LINE_CAP`] rendered lines. `changed_lines` tracks the new-file
//! line numbers of additions only: that is the line space inline comments
//! address.

pub mod parser;

use tracing::warn;

use crate::context::FileContext;
use parser::{DiffHunk, DiffLine, looks_like_binary_patch, parse_unified_diff};

/// Hard cap on rendered chunk lines; the tail is truncated with a warning.
pub const CHUNK_LINE_CAP: usize = 100;

/// Processor default. The orchestrator overrides this with its own width.
pub const DEFAULT_CONTEXT_LINES: usize = 20;

/// One reviewable slice of a file's diff.
#[derive(Debug, Clone)]
pub struct DiffChunk {
    /// New path when present, old path otherwise.
    pub filename: String,
    /// Old path, kept for rename-aware inline positions.
    pub old_path: String,
    /// Language detected from the filename extension; `"unknown"` otherwise.
    pub language: String,
    /// Rendered diff slice with `+`/`-`/space prefixes.
    pub diff_text: String,
    pub additions: u32,
    pub deletions: u32,
    /// New-file line numbers of the additions in this chunk.
    pub changed_lines: Vec<u32>,
    /// File slice around the first changed line, attached by the orchestrator.
    pub file_context: Option<FileContext>,
}

/// Detects a language id from the file extension.
pub fn language_for_path(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or_default();
    match ext {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "py" => "python",
        "java" => "java",
        "go" => "go",
        "rs" => "rust",
        "cpp" | "cc" | "cxx" => "cpp",
        "c" | "h" => "c",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "sql" => "sql",
        "sh" | "bash" => "shell",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "md" => "markdown",
        _ => "unknown",
    }
}

/// Extracts chunks from one file's unified diff.
///
/// Binary patches yield nothing; hunks without changes are dropped. The
/// caller is expected to skip deleted files before getting here.
pub fn extract_chunks(
    old_path: &str,
    new_path: &str,
    diff: &str,
    context_lines: usize,
) -> Vec<DiffChunk> {
    if looks_like_binary_patch(diff) {
        return Vec::new();
    }

    let filename = if new_path.is_empty() || new_path == "/dev/null" {
        old_path.to_string()
    } else {
        new_path.to_string()
    };
    let language = language_for_path(&filename).to_string();

    parse_unified_diff(diff)
        .into_iter()
        .filter_map(|hunk| build_chunk(&hunk, &filename, old_path, &language, context_lines))
        .collect()
}

fn build_chunk(
    hunk: &DiffHunk,
    filename: &str,
    old_path: &str,
    language: &str,
    context_lines: usize,
) -> Option<DiffChunk> {
    let changed: Vec<usize> = hunk
        .lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_change())
        .map(|(i, _)| i)
        .collect();
    if changed.is_empty() {
        return None;
    }

    // Select changed lines plus context windows around additions.
    // A BTreeSet keeps original order and deduplicates overlap.
    let mut selected: std::collections::BTreeSet<usize> = changed.iter().copied().collect();
    for &i in &changed {
        if !matches!(hunk.lines[i], DiffLine::Added { .. }) {
            continue;
        }
        // Up to `context_lines` unchanged lines before the addition.
        // Changed lines on the way are already selected and don't count.
        let mut taken = 0usize;
        let mut j = i;
        while j > 0 && taken < context_lines {
            j -= 1;
            if hunk.lines[j].is_change() {
                continue;
            }
            selected.insert(j);
            taken += 1;
        }
        // Up to `context_lines` unchanged lines after, halting at the next change.
        taken = 0;
        j = i;
        while j + 1 < hunk.lines.len() && taken < context_lines {
            j += 1;
            if hunk.lines[j].is_change() {
                break;
            }
            selected.insert(j);
            taken += 1;
        }
    }

    let mut rendered: Vec<String> = Vec::with_capacity(selected.len());
    let mut additions = 0u32;
    let mut deletions = 0u32;
    let mut changed_lines: Vec<u32> = Vec::new();

    for &idx in &selected {
        match &hunk.lines[idx] {
            DiffLine::Added { new_line, content } => {
                additions += 1;
                changed_lines.push(*new_line);
                rendered.push(format!("+{content}"));
            }
            DiffLine::Removed { content, .. } => {
                deletions += 1;
                rendered.push(format!("-{content}"));
            }
            DiffLine::Context { content, .. } => {
                rendered.push(format!(" {content}"));
            }
        }
    }

    if rendered.len() > CHUNK_LINE_CAP {
        warn!(
            file = filename,
            lines = rendered.len(),
            cap = CHUNK_LINE_CAP,
            "chunk exceeds line cap; truncating tail"
        );
        rendered.truncate(CHUNK_LINE_CAP);
    }

    Some(DiffChunk {
        filename: filename.to_string(),
        old_path: old_path.to_string(),
        language: language.to_string(),
        diff_text: rendered.join("\n"),
        additions,
        deletions,
        changed_lines,
        file_context: None,
    })
}
