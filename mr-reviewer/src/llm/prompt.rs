//! Prompt assembly for single-chunk and batched reviews.
//!
//! The system prompt pins the model to changed lines only and to a strict
//! one-JSON-object response. User prompts embed the imports and the numbered
//! context window so the model has no excuse to hallucinate missing symbols.

use crate::diff::DiffChunk;

/// Fixed system prompt shared by both call shapes.
pub const SYSTEM_PROMPT: &str = "\
You are an automated code reviewer for merge requests.

Rules:
- Review ONLY lines marked with + or - in the diff. Unmarked lines are \
context and must not be flagged.
- The \"Available Imports\" section lists imports that exist in the file. \
Trust it and check it before reporting a missing or unused import.
- The \"Code Context\" section shows the surrounding file content. Check it \
before reporting an undefined identifier.
- Priority order: security > logic > performance > best-practice > style.
- Respond with exactly ONE JSON object and nothing else: \
{\"summary\": string, \"issues\": [{\"line\": number, \"severity\": \
\"critical\"|\"high\"|\"medium\"|\"low\", \"type\": \"security\"|\
\"performance\"|\"logic\"|\"style\", \"message\": string, \"suggestion\": \
string}]}.
- \"line\" must be a new-file line number of a changed line.
- Do not wrap the JSON in markdown fences.";

/// Extra response requirement appended to batched prompts.
const BATCH_TRAILER: &str = "\
Return ONE JSON document covering all files above. Every issue MUST carry a \
\"file\" field holding the exact file path from its section header.";

/// User prompt for one chunk.
pub fn build_single_prompt(chunk: &DiffChunk) -> String {
    let mut out = String::with_capacity(1024);
    push_chunk_sections(&mut out, chunk);
    out.push_str("\nReview the diff above.");
    out
}

/// User prompt enumerating several chunks under `## File i/N` headers.
pub fn build_batched_prompt(chunks: &[DiffChunk]) -> String {
    let mut out = String::with_capacity(1024 * chunks.len());
    let total = chunks.len();
    for (i, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!("## File {}/{}: {}\n\n", i + 1, total, chunk.filename));
        push_chunk_sections(&mut out, chunk);
        out.push('\n');
    }
    out.push_str(BATCH_TRAILER);
    out
}

fn push_chunk_sections(out: &mut String, chunk: &DiffChunk) {
    out.push_str(&format!(
        "Path: {}\nLanguage: {}\nChanges: +{} −{}\n\n",
        chunk.filename, chunk.language, chunk.additions, chunk.deletions
    ));

    match chunk.file_context.as_ref() {
        Some(ctx) if !ctx.imports.is_empty() => {
            out.push_str("### Available Imports\n");
            for imp in &ctx.imports {
                out.push_str(imp);
                out.push('\n');
            }
            out.push('\n');
        }
        _ => {
            out.push_str("### Available Imports\nNo imports were detected in this file.\n\n");
        }
    }

    if let Some(ctx) = chunk.file_context.as_ref() {
        out.push_str(&format!(
            "### Code Context (lines {}-{} of {})\n",
            ctx.start_line_number, ctx.end_line_number, ctx.total_lines
        ));
        for (num, line) in ctx.numbered_lines() {
            if num == ctx.target_line_number {
                out.push_str(&format!("→ {num:>4} | {line}\n"));
            } else {
                out.push_str(&format!("  {num:>4} | {line}\n"));
            }
        }
        out.push('\n');
    }

    out.push_str("### Diff\n```diff\n");
    out.push_str(&chunk.diff_text);
    out.push_str("\n```\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_file_context;

    fn chunk_with_context() -> DiffChunk {
        let mut chunks = crate::diff::extract_chunks(
            "utils.ts",
            "utils.ts",
            "@@ -1,2 +1,3 @@\n one\n+added\n two\n",
            10,
        );
        let mut chunk = chunks.remove(0);
        chunk.file_context = Some(build_file_context(
            "import { x } from './x';\none\nadded\ntwo\n",
            "typescript",
            2,
            2,
        ));
        chunk
    }

    #[test]
    fn single_prompt_carries_all_sections() {
        let prompt = build_single_prompt(&chunk_with_context());
        assert!(prompt.contains("Path: utils.ts"));
        assert!(prompt.contains("Language: typescript"));
        assert!(prompt.contains("### Available Imports"));
        assert!(prompt.contains("import { x } from './x';"));
        assert!(prompt.contains("### Code Context"));
        assert!(prompt.contains("### Diff"));
        assert!(prompt.contains("+added"));
    }

    #[test]
    fn target_line_gets_the_arrow() {
        let prompt = build_single_prompt(&chunk_with_context());
        assert!(prompt.contains("→    2 | one"));
        assert!(prompt.contains("     1 | import"));
    }

    #[test]
    fn missing_imports_are_stated_explicitly() {
        let mut chunk = chunk_with_context();
        chunk.file_context = None;
        let prompt = build_single_prompt(&chunk);
        assert!(prompt.contains("No imports were detected in this file."));
        assert!(!prompt.contains("### Code Context"));
    }

    #[test]
    fn batched_prompt_numbers_files_and_demands_file_fields() {
        let a = chunk_with_context();
        let mut b = chunk_with_context();
        b.filename = "main.ts".into();
        let prompt = build_batched_prompt(&[a, b]);
        assert!(prompt.contains("## File 1/2: utils.ts"));
        assert!(prompt.contains("## File 2/2: main.ts"));
        assert!(prompt.contains("MUST carry a \"file\" field"));
    }
}
