//! Issue model emitted by the LLM and refined by the verifier.

use serde::{Deserialize, Serialize};

/// Issue severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Quality-score impact of one issue of this severity.
    pub fn impact(self) -> u32 {
        match self {
            Severity::Critical => 15,
            Severity::High => 10,
            Severity::Medium => 5,
            Severity::Low => 2,
        }
    }

    /// True for severities that earn an inline discussion on the MR.
    pub fn posts_inline(self) -> bool {
        matches!(self, Severity::Critical | Severity::High | Severity::Medium)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Lenient parse; anything unknown degrades to `Low`.
    pub fn parse_or_low(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

/// Issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Security,
    Performance,
    Logic,
    Style,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::Security => "security",
            IssueType::Performance => "performance",
            IssueType::Logic => "logic",
            IssueType::Style => "style",
        }
    }

    /// Lenient parse; anything unknown degrades to `Style`.
    pub fn parse_or_style(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "security" => IssueType::Security,
            "performance" => IssueType::Performance,
            "logic" => IssueType::Logic,
            _ => IssueType::Style,
        }
    }
}

/// One issue reported by the model.
///
/// `line` addresses the new-file line space. The verifier never mutates an
/// issue; it only decides pass/drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub file: String,
    pub line: u32,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub message: String,
    pub suggestion: String,
}

/// Parsed result of one LLM review call.
#[derive(Debug, Clone, Default)]
pub struct ReviewOutcome {
    pub summary: String,
    pub issues: Vec<Issue>,
}

impl ReviewOutcome {
    /// The empty review used for the disabled-LLM and parse-exhaustion paths.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impact_map_matches_the_scoring_table() {
        assert_eq!(Severity::Critical.impact(), 15);
        assert_eq!(Severity::High.impact(), 10);
        assert_eq!(Severity::Medium.impact(), 5);
        assert_eq!(Severity::Low.impact(), 2);
    }

    #[test]
    fn inline_gating_excludes_low() {
        assert!(Severity::Critical.posts_inline());
        assert!(Severity::High.posts_inline());
        assert!(Severity::Medium.posts_inline());
        assert!(!Severity::Low.posts_inline());
    }

    #[test]
    fn lenient_parses_degrade_instead_of_failing() {
        assert_eq!(Severity::parse_or_low("HIGH"), Severity::High);
        assert_eq!(Severity::parse_or_low("blocker"), Severity::Low);
        assert_eq!(IssueType::parse_or_style("Security"), IssueType::Security);
        assert_eq!(IssueType::parse_or_style("smell"), IssueType::Style);
    }

    #[test]
    fn issue_serializes_with_the_wire_field_names() {
        let issue = Issue {
            file: "a.ts".into(),
            line: 3,
            severity: Severity::High,
            issue_type: IssueType::Logic,
            message: "m".into(),
            suggestion: "s".into(),
        };
        let raw = serde_json::to_string(&issue).unwrap();
        assert!(raw.contains("\"type\":\"logic\""));
        assert!(raw.contains("\"severity\":\"high\""));
    }
}
