//! Import extraction from a file's prefix.
//!
//! Per-language pattern tables with an explicit ts-style default. The scan
//! covers the first [`SCAN_LINES`] lines, skips blank and comment lines, and
//! gives up after [`MAX_MISSES`] consecutive non-matching code lines: past
//! the import block, nothing interesting follows.

use lazy_static::lazy_static;
use regex::Regex;

/// How deep into the file the scan reaches.
pub const SCAN_LINES: usize = 50;

/// Consecutive non-blank, non-comment, non-matching lines before giving up.
pub const MAX_MISSES: usize = 3;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static import pattern must compile"))
        .collect()
}

lazy_static! {
    static ref TS_PATTERNS: Vec<Regex> = compile(&[
        r#"^\s*import\s"#,
        r#"^\s*export\s*\{"#,
        r#"^\s*from\s+["']"#,
        r#"^\s*(?:const|let|var)\s+.+=\s*require\s*\("#,
        r#"^\s*type\s*\{"#,
    ]);
    static ref PY_PATTERNS: Vec<Regex> = compile(&[
        r#"^\s*import\s"#,
        r#"^\s*from\s+\S+\s+import\s"#,
    ]);
    static ref JAVA_PATTERNS: Vec<Regex> = compile(&[
        r#"^\s*import\s"#,
        r#"^\s*package\s"#,
    ]);
    static ref GO_PATTERNS: Vec<Regex> = compile(&[
        r#"^\s*import\s+"[^"]+""#,
        r#"^\s*import\s+\($"#,
    ]);
    static ref RUST_PATTERNS: Vec<Regex> = compile(&[r#"^\s*use\s"#]);
    static ref PHP_PATTERNS: Vec<Regex> = compile(&[
        r#"^\s*use\s"#,
        r#"^\s*require"#,
        r#"^\s*include"#,
    ]);
}

/// Pattern family for a language id; ts-style rules are the default.
fn patterns_for(language: &str) -> &'static [Regex] {
    match language {
        "python" => &PY_PATTERNS,
        "java" => &JAVA_PATTERNS,
        "go" => &GO_PATTERNS,
        "rust" => &RUST_PATTERNS,
        "php" => &PHP_PATTERNS,
        _ => &TS_PATTERNS,
    }
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with("//")
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
        || trimmed.starts_with('#')
}

/// Collects import-like lines from the file prefix, indentation preserved.
pub fn extract_imports(text: &str, language: &str) -> Vec<String> {
    let patterns = patterns_for(language);
    let mut imports = Vec::new();
    let mut misses = 0usize;

    for line in text.lines().take(SCAN_LINES) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || is_comment(trimmed) {
            continue;
        }
        if patterns.iter().any(|p| p.is_match(line)) {
            imports.push(line.to_string());
            misses = 0;
        } else {
            misses += 1;
            if misses >= MAX_MISSES {
                break;
            }
        }
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typescript_family() {
        let src = "\
import { api } from './api';
import type { User } from './types';
const fs = require('fs');
export { helper };

// setup
const X = 1;
";
        let found = extract_imports(src, "typescript");
        assert_eq!(
            found,
            vec![
                "import { api } from './api';",
                "import type { User } from './types';",
                "const fs = require('fs');",
                "export { helper };",
            ]
        );
    }

    #[test]
    fn python_family() {
        let src = "\
#!/usr/bin/env python
# module docstring comment
import os
from typing import Optional
import sys

def main():
    pass
";
        assert_eq!(
            extract_imports(src, "python"),
            vec!["import os", "from typing import Optional", "import sys"]
        );
    }

    #[test]
    fn java_family_includes_package() {
        let src = "package com.acme.billing;\nimport java.util.List;\nclass A {}\n";
        assert_eq!(
            extract_imports(src, "java"),
            vec!["package com.acme.billing;", "import java.util.List;"]
        );
    }

    #[test]
    fn go_family_matches_plain_and_block_openers() {
        let src = "import \"fmt\"\nimport (\nfunc main() {}\n";
        let found = extract_imports(src, "go");
        assert_eq!(found, vec!["import \"fmt\"", "import ("]);
    }

    #[test]
    fn rust_family() {
        let src = "use std::fmt;\nuse crate::db::Pool;\n\nfn main() {}\n";
        assert_eq!(
            extract_imports(src, "rust"),
            vec!["use std::fmt;", "use crate::db::Pool;"]
        );
    }

    #[test]
    fn unknown_language_falls_back_to_ts_rules() {
        let src = "import thing from 'thing';\nbody();\n";
        assert_eq!(
            extract_imports(src, "unknown"),
            vec!["import thing from 'thing';"]
        );
    }

    #[test]
    fn indentation_is_preserved() {
        let src = "  import a from 'a';\n";
        assert_eq!(extract_imports(src, "typescript"), vec!["  import a from 'a';"]);
    }

    #[test]
    fn scan_stops_after_three_consecutive_code_misses() {
        let src = "\
import a from 'a';
const x = 1;
const y = 2;
const z = 3;
import late from 'late';
";
        // Three misses end the scan; the late import is never seen.
        assert_eq!(extract_imports(src, "typescript"), vec!["import a from 'a';"]);
    }

    #[test]
    fn blanks_and_comments_do_not_count_as_misses() {
        let src = "\
import a from 'a';
const x = 1;

// interlude
const y = 2;
import b from 'b';
";
        // Only two code misses accumulate before the next import resets them.
        assert_eq!(
            extract_imports(src, "typescript"),
            vec!["import a from 'a';", "import b from 'b';"]
        );
    }

    #[test]
    fn scan_is_limited_to_the_file_prefix() {
        let mut src = String::new();
        for _ in 0..SCAN_LINES {
            src.push_str("import x from 'x';\n");
        }
        src.push_str("import beyond from 'beyond';\n");
        assert_eq!(extract_imports(&src, "typescript").len(), SCAN_LINES);
    }

    #[test]
    fn prefix_repetition_is_idempotent() {
        let mut src = String::new();
        for i in 0..SCAN_LINES {
            src.push_str(&format!("import m{i} from 'm{i}';\n"));
        }
        let doubled = format!("{src}{src}");
        assert_eq!(
            extract_imports(&src, "typescript"),
            extract_imports(&doubled, "typescript")
        );
    }
}
