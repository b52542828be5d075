//! Quality scoring and the summary note posted on the MR.

use std::collections::BTreeMap;

use crate::types::{Issue, Severity};

/// `100 − Σ impact(severity)`, clamped at 0.
pub fn quality_score(issues: &[Issue]) -> u32 {
    let penalty: u32 = issues.iter().map(|i| i.severity.impact()).sum();
    100u32.saturating_sub(penalty)
}

/// Renders the summary comment: score, counts by severity and type, a
/// per-file breakdown sorted most-severe-first, and a large-MR warning when
/// files were skipped.
pub fn render_summary(
    llm_summary: &str,
    issues: &[Issue],
    score: u32,
    skipped_files: usize,
    reviewed_files: usize,
) -> String {
    let mut out = String::from("## Automated Code Review\n\n");

    if !llm_summary.trim().is_empty() {
        out.push_str(llm_summary.trim());
        out.push_str("\n\n");
    }

    out.push_str(&format!("**Quality score: {score}/100**\n\n"));

    if issues.is_empty() {
        out.push_str("No issues found.\n");
    } else {
        out.push_str(&format!("**Issues found: {}**\n\n", issues.len()));

        out.push_str("| Severity | Count |\n|---|---|\n");
        for sev in [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ] {
            let count = issues.iter().filter(|i| i.severity == sev).count();
            if count > 0 {
                out.push_str(&format!("| {} | {} |\n", sev.as_str(), count));
            }
        }
        out.push('\n');

        let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
        for issue in issues {
            *by_type.entry(issue.issue_type.as_str()).or_default() += 1;
        }
        out.push_str("| Type | Count |\n|---|---|\n");
        for (ty, count) in by_type {
            out.push_str(&format!("| {ty} | {count} |\n"));
        }
        out.push('\n');

        out.push_str("### By file\n");
        for (file, file_issues) in group_by_file(issues) {
            let worst = file_issues
                .iter()
                .map(|i| i.severity)
                .min()
                .unwrap_or(Severity::Low);
            out.push_str(&format!(
                "- `{}` — {} issue(s), worst: {}\n",
                file,
                file_issues.len(),
                worst.as_str()
            ));
        }
    }

    if skipped_files > 0 {
        out.push_str(&format!(
            "\n⚠️ **Large merge request:** only the first {reviewed_files} files were \
reviewed; {skipped_files} files were skipped.\n"
        ));
    }

    out
}

/// Groups issues by file, files ordered by their most severe issue.
fn group_by_file(issues: &[Issue]) -> Vec<(String, Vec<&Issue>)> {
    let mut grouped: BTreeMap<String, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        grouped.entry(issue.file.clone()).or_default().push(issue);
    }
    let mut files: Vec<(String, Vec<&Issue>)> = grouped.into_iter().collect();
    // Severity derives Ord with Critical first, so min() is the worst.
    files.sort_by_key(|(_, list)| list.iter().map(|i| i.severity).min().unwrap_or(Severity::Low));
    files
}

/// Body of one inline discussion.
pub fn render_inline_comment(issue: &Issue) -> String {
    format!(
        "**[{}] {}**\n\n{}\n\n**Suggestion:** {}",
        issue.severity.as_str().to_uppercase(),
        issue.issue_type.as_str(),
        issue.message,
        issue.suggestion
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IssueType;

    fn issue(file: &str, severity: Severity) -> Issue {
        Issue {
            file: file.into(),
            line: 1,
            severity,
            issue_type: IssueType::Logic,
            message: "m".into(),
            suggestion: "s".into(),
        }
    }

    #[test]
    fn score_subtracts_severity_impacts() {
        let issues = vec![issue("a.ts", Severity::High), issue("b.ts", Severity::Low)];
        assert_eq!(quality_score(&issues), 88);
    }

    #[test]
    fn score_clamps_at_zero() {
        let issues: Vec<Issue> = (0..10).map(|_| issue("a.ts", Severity::Critical)).collect();
        assert_eq!(quality_score(&issues), 0);
    }

    #[test]
    fn empty_review_scores_perfect() {
        assert_eq!(quality_score(&[]), 100);
    }

    #[test]
    fn summary_lists_counts_and_files_most_severe_first() {
        let issues = vec![
            issue("styles.ts", Severity::Low),
            issue("auth.ts", Severity::Critical),
            issue("auth.ts", Severity::Low),
            issue("db.ts", Severity::Medium),
        ];
        let body = render_summary("Looks risky.", &issues, 68, 0, 4);
        assert!(body.contains("Looks risky."));
        assert!(body.contains("**Quality score: 68/100**"));
        assert!(body.contains("| critical | 1 |"));
        assert!(body.contains("| low | 2 |"));
        assert!(body.contains("| logic | 4 |"));

        let auth = body.find("`auth.ts`").unwrap();
        let db = body.find("`db.ts`").unwrap();
        let styles = body.find("`styles.ts`").unwrap();
        assert!(auth < db && db < styles);
        assert!(!body.contains("Large merge request"));
    }

    #[test]
    fn large_mr_warning_carries_both_counts() {
        let body = render_summary("", &[], 100, 23, 50);
        assert!(body.contains("first 50 files"));
        assert!(body.contains("23 files were skipped"));
    }

    #[test]
    fn inline_comment_names_severity_and_type() {
        let body = render_inline_comment(&issue("a.ts", Severity::High));
        assert!(body.starts_with("**[HIGH] logic**"));
        assert!(body.contains("**Suggestion:** s"));
    }
}
