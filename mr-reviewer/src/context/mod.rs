//! File context around a changed line: a ±N slice plus the imports scanned
//! from the file prefix. This is what grounds the LLM prompt and the
//! verifier's false-positive checks.

pub mod imports;

use forge_client::ForgeClient;
use forge_client::errors::ForgeResult;
use serde::{Deserialize, Serialize};

use crate::diff::language_for_path;
use imports::extract_imports;

/// A 1-based inclusive window of file lines around a target line.
///
/// Invariants: `start_line_number ≤ target_line_number ≤ end_line_number`
/// and `lines.len() == end − start + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContext {
    pub lines: Vec<String>,
    pub start_line_number: u32,
    pub target_line_number: u32,
    pub end_line_number: u32,
    pub total_lines: u32,
    pub imports: Vec<String>,
}

impl FileContext {
    /// Lines paired with their absolute 1-based numbers.
    pub fn numbered_lines(&self) -> impl Iterator<Item = (u32, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, l)| (self.start_line_number + i as u32, l.as_str()))
    }
}

/// Builds a context window from full file text.
///
/// `target_line` is clamped into the file; an empty file yields a single
/// empty line so the window invariants hold.
pub fn build_file_context(
    text: &str,
    language: &str,
    target_line: u32,
    context_lines: u32,
) -> FileContext {
    let all: Vec<&str> = text.lines().collect();
    let total = all.len().max(1) as u32;
    let target = target_line.clamp(1, total);
    let start = target.saturating_sub(context_lines).max(1);
    let end = (target + context_lines).min(total);

    let lines = if all.is_empty() {
        vec![String::new()]
    } else {
        all[(start - 1) as usize..end as usize]
            .iter()
            .map(|s| s.to_string())
            .collect()
    };

    FileContext {
        lines,
        start_line_number: start,
        target_line_number: target,
        end_line_number: end,
        total_lines: total,
        imports: extract_imports(text, language),
    }
}

/// Fetches the file at `git_ref` and builds the window around `target_line`.
pub async fn fetch_file_context(
    forge: &ForgeClient,
    project_id: u64,
    path: &str,
    git_ref: &str,
    target_line: u32,
    context_lines: u32,
) -> ForgeResult<FileContext> {
    let text = forge.get_file_content(project_id, path, git_ref).await?;
    Ok(build_file_context(
        &text,
        language_for_path(path),
        target_line,
        context_lines,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ten_lines() -> String {
        (1..=10)
            .map(|i| format!("line{i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn window_is_inclusive_and_one_based() {
        let ctx = build_file_context(&ten_lines(), "typescript", 5, 2);
        assert_eq!(ctx.start_line_number, 3);
        assert_eq!(ctx.target_line_number, 5);
        assert_eq!(ctx.end_line_number, 7);
        assert_eq!(ctx.total_lines, 10);
        assert_eq!(
            ctx.lines.len() as u32,
            ctx.end_line_number - ctx.start_line_number + 1
        );
        assert_eq!(ctx.lines[0], "line3");
        assert_eq!(ctx.lines[4], "line7");
    }

    #[test]
    fn window_clips_at_file_edges() {
        let ctx = build_file_context(&ten_lines(), "typescript", 1, 4);
        assert_eq!(ctx.start_line_number, 1);
        assert_eq!(ctx.end_line_number, 5);

        let ctx = build_file_context(&ten_lines(), "typescript", 10, 4);
        assert_eq!(ctx.start_line_number, 6);
        assert_eq!(ctx.end_line_number, 10);
    }

    #[test]
    fn out_of_range_target_is_clamped() {
        let ctx = build_file_context(&ten_lines(), "typescript", 99, 2);
        assert_eq!(ctx.target_line_number, 10);
        assert_eq!(ctx.end_line_number, 10);
    }

    #[test]
    fn imports_come_from_the_file_prefix() {
        let src = "import { a } from './a';\n\nexport function f() {}\nbody();\nmore();\n";
        let ctx = build_file_context(src, "typescript", 4, 1);
        assert_eq!(ctx.imports, vec!["import { a } from './a';"]);
    }

    #[test]
    fn numbered_lines_carry_absolute_numbers() {
        let ctx = build_file_context(&ten_lines(), "typescript", 5, 1);
        let nums: Vec<u32> = ctx.numbered_lines().map(|(n, _)| n).collect();
        assert_eq!(nums, vec![4, 5, 6]);
    }
}
