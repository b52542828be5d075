//! Unified-diff parser.
//!
//! Robust to missing `---`/`+++` headers (only `@@` hunk headers are
//! required), ignores `\ No newline at end of file` markers, and detects
//! binary patches heuristically.

/// One line inside a diff hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Added { new_line: u32, content: String },
    Removed { old_line: u32, content: String },
    Context { new_line: u32, content: String },
}

impl DiffLine {
    pub fn is_change(&self) -> bool {
        !matches!(self, DiffLine::Context { .. })
    }
}

/// A contiguous block of changes with its header coordinates.
#[derive(Debug, Clone)]
pub struct DiffHunk {
    pub old_start: u32,
    pub new_start: u32,
    pub lines: Vec<DiffLine>,
}

/// Parses unified-diff text into hunks. Prelude before the first `@@` is
/// skipped; unknown line shapes inside a hunk are treated as context.
pub fn parse_unified_diff(input: &str) -> Vec<DiffHunk> {
    let mut hunks: Vec<DiffHunk> = Vec::new();
    let mut current: Option<DiffHunk> = None;
    let mut old_line = 0u32;
    let mut new_line = 0u32;

    for line in input.lines() {
        if line.starts_with("@@") {
            if let Some(h) = current.take() {
                if !h.lines.is_empty() {
                    hunks.push(h);
                }
            }
            if let Some((o_start, n_start)) = parse_hunk_header(line) {
                old_line = o_start;
                new_line = n_start;
                current = Some(DiffHunk {
                    old_start: o_start,
                    new_start: n_start,
                    lines: Vec::new(),
                });
            }
            continue;
        }

        // "\ No newline at end of file" and friends.
        if line.starts_with("\\ ") {
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            continue;
        };

        if let Some(rest) = line.strip_prefix('+') {
            hunk.lines.push(DiffLine::Added {
                new_line,
                content: rest.to_string(),
            });
            new_line += 1;
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.lines.push(DiffLine::Removed {
                old_line,
                content: rest.to_string(),
            });
            old_line += 1;
        } else {
            let content = line.strip_prefix(' ').unwrap_or(line).to_string();
            hunk.lines.push(DiffLine::Context { new_line, content });
            old_line += 1;
            new_line += 1;
        }
    }

    if let Some(h) = current {
        if !h.lines.is_empty() {
            hunks.push(h);
        }
    }
    hunks
}

/// Extracts `(old_start, new_start)` from a `@@ -a,b +c,d @@` header.
/// The trailing section heading (if any) is ignored.
fn parse_hunk_header(line: &str) -> Option<(u32, u32)> {
    let rest = line.strip_prefix("@@")?;
    let body = match rest.find("@@") {
        Some(i) => &rest[..i],
        None => rest,
    };
    let (old_part, new_part) = body.split_once('+')?;
    let old_start = leading_number(old_part.trim().trim_start_matches('-'))?;
    let new_start = leading_number(new_part.trim())?;
    Some((old_start, new_start))
}

fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Heuristic detection of binary patches.
pub fn looks_like_binary_patch(s: &str) -> bool {
    s.contains("GIT binary patch")
        || s.starts_with("Binary files ")
        || (s.starts_with("Files ") && s.contains(" differ"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
@@ -10,4 +10,5 @@ fn main() {
 alpha
-beta
+beta2
+gamma
 delta
";

    #[test]
    fn header_coordinates_are_tracked() {
        let hunks = parse_unified_diff(SAMPLE);
        assert_eq!(hunks.len(), 1);
        let h = &hunks[0];
        assert_eq!(h.old_start, 10);
        assert_eq!(h.new_start, 10);
        assert_eq!(h.lines.len(), 5);
    }

    #[test]
    fn added_lines_carry_new_file_numbers() {
        let hunks = parse_unified_diff(SAMPLE);
        let added: Vec<(u32, &str)> = hunks[0]
            .lines
            .iter()
            .filter_map(|l| match l {
                DiffLine::Added { new_line, content } => Some((*new_line, content.as_str())),
                _ => None,
            })
            .collect();
        // "alpha" is line 10, the removal does not consume a new-file line,
        // so "beta2" lands on 11 and "gamma" on 12.
        assert_eq!(added, vec![(11, "beta2"), (12, "gamma")]);
    }

    #[test]
    fn prelude_and_no_newline_markers_are_skipped() {
        let input = "diff --git a/x b/x\nindex 123..456\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n\\ No newline at end of file\n";
        let hunks = parse_unified_diff(input);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines.len(), 2);
    }

    #[test]
    fn header_without_lengths_parses() {
        let hunks = parse_unified_diff("@@ -3 +4 @@\n+x\n");
        assert_eq!(hunks[0].old_start, 3);
        assert_eq!(hunks[0].new_start, 4);
    }

    #[test]
    fn binary_patches_are_detected() {
        assert!(looks_like_binary_patch("Binary files a/x.png and b/x.png differ"));
        assert!(looks_like_binary_patch("literal 1234\nGIT binary patch\n"));
        assert!(!looks_like_binary_patch("@@ -1 +1 @@\n-a\n+b\n"));
    }
}
