//! Strict-but-forgiving extraction of the review JSON from model output.
//!
//! Strict about shape: `summary` must be a string and `issues` an array, or
//! the whole response is rejected (and the caller retries). Forgiving about
//! issue fields: anything missing or mistyped is coerced to a default
//! rather than dropping the issue.

use serde_json::Value;
use thiserror::Error;

use crate::types::{Issue, IssueType, ReviewOutcome, Severity};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response JSON is missing required field: {0}")]
    MissingField(&'static str),
}

/// Parses one model response into a review.
///
/// `fallback_file` labels issues that omit `file` (the single-chunk path
/// passes the chunk's filename; the batched path passes nothing and relies
/// on the model honoring the prompt).
pub fn parse_review(raw: &str, fallback_file: Option<&str>) -> Result<ReviewOutcome, ParseError> {
    let stripped = strip_code_fences(raw);
    let value: Value = serde_json::from_str(stripped.trim())?;

    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField("summary"))?
        .to_string();
    let raw_issues = value
        .get("issues")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingField("issues"))?;

    let issues = raw_issues
        .iter()
        .map(|v| coerce_issue(v, fallback_file))
        .collect();

    Ok(ReviewOutcome { summary, issues })
}

/// Builds one issue from a JSON value, defaulting whatever is absent.
fn coerce_issue(v: &Value, fallback_file: Option<&str>) -> Issue {
    let file = v
        .get("file")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or(fallback_file)
        .unwrap_or_default()
        .to_string();
    let line = v.get("line").and_then(Value::as_u64).unwrap_or(0) as u32;
    let severity = v
        .get("severity")
        .and_then(Value::as_str)
        .map(Severity::parse_or_low)
        .unwrap_or(Severity::Low);
    let issue_type = v
        .get("type")
        .and_then(Value::as_str)
        .map(IssueType::parse_or_style)
        .unwrap_or(IssueType::Style);
    let message = v
        .get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("No description")
        .to_string();
    let suggestion = v
        .get("suggestion")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("No suggestion")
        .to_string();

    Issue {
        file,
        line,
        severity,
        issue_type,
        message,
        suggestion,
    }
}

/// Removes a leading ```/```json fence line and a trailing ``` fence line.
fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if s.starts_with("```") {
        s = match s.find('\n') {
            Some(i) => &s[i + 1..],
            None => "",
        };
    }
    if let Some(stripped) = s.trim_end().strip_suffix("```") {
        s = stripped;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_response_parses() {
        let raw = r#"{"summary":"ok","issues":[{"line":12,"severity":"high","type":"logic","message":"m","suggestion":"s"}]}"#;
        let outcome = parse_review(raw, Some("utils.ts")).unwrap();
        assert_eq!(outcome.summary, "ok");
        assert_eq!(outcome.issues.len(), 1);
        let issue = &outcome.issues[0];
        assert_eq!(issue.file, "utils.ts");
        assert_eq!(issue.line, 12);
        assert_eq!(issue.severity, Severity::High);
        assert_eq!(issue.issue_type, IssueType::Logic);
    }

    #[test]
    fn fenced_responses_are_unwrapped() {
        let raw = "```json\n{\"summary\":\"ok\",\"issues\":[]}\n```";
        assert!(parse_review(raw, None).is_ok());
        let bare = "```\n{\"summary\":\"ok\",\"issues\":[]}\n```";
        assert!(parse_review(bare, None).is_ok());
    }

    #[test]
    fn missing_issue_fields_are_coerced_to_defaults() {
        let raw = r#"{"summary":"ok","issues":[{}]}"#;
        let outcome = parse_review(raw, None).unwrap();
        let issue = &outcome.issues[0];
        assert_eq!(issue.line, 0);
        assert_eq!(issue.severity, Severity::Low);
        assert_eq!(issue.issue_type, IssueType::Style);
        assert_eq!(issue.message, "No description");
        assert_eq!(issue.suggestion, "No suggestion");
    }

    #[test]
    fn explicit_file_field_wins_over_the_fallback() {
        let raw = r#"{"summary":"ok","issues":[{"file":"main.ts","line":4}]}"#;
        let outcome = parse_review(raw, Some("utils.ts")).unwrap();
        assert_eq!(outcome.issues[0].file, "main.ts");
    }

    #[test]
    fn shape_violations_are_rejected() {
        assert!(parse_review("not json at all", None).is_err());
        assert!(matches!(
            parse_review(r#"{"issues":[]}"#, None),
            Err(ParseError::MissingField("summary"))
        ));
        assert!(matches!(
            parse_review(r#"{"summary":"ok","issues":"none"}"#, None),
            Err(ParseError::MissingField("issues"))
        ));
    }
}
