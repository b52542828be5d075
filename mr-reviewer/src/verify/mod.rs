//! False-positive filtering for LLM-reported issues.
//!
//! Routing is keyword-based: import complaints and undefined-identifier
//! complaints get checked against real file content; security and
//! performance findings bypass verification; everything else passes with
//! medium confidence. Fetch failures degrade to "valid, low confidence" -
//! a flaky forge must not silently eat findings.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use forge_client::ForgeClient;

use crate::context::{FileContext, fetch_file_context};
use crate::types::{Issue, IssueType};

/// Window used when fetching extended context for definition checks.
const EXTENDED_CONTEXT_LINES: u32 = 50;

/// Verifier confidence in its own verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Pass/drop decision for one issue.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub is_valid: bool,
    pub confidence: Confidence,
    pub reason: String,
}

impl VerificationResult {
    fn valid(confidence: Confidence, reason: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            confidence,
            reason: reason.into(),
        }
    }

    fn false_positive(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            confidence: Confidence::High,
            reason: reason.into(),
        }
    }
}

/// Which verification path an issue routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    Import,
    Definition,
    Bypass,
    Unverified,
}

const IMPORT_MARKERS: [&str; 4] = ["import", "not imported", "missing import", "cannot find"];
const DEFINITION_MARKERS: [&str; 4] = ["not defined", "undefined", "not declared", "cannot find name"];

/// Routes an issue by message keywords, then by type.
pub fn classify(issue: &Issue) -> IssueKind {
    let msg = issue.message.to_lowercase();
    if IMPORT_MARKERS.iter().any(|m| msg.contains(m)) {
        return IssueKind::Import;
    }
    if DEFINITION_MARKERS.iter().any(|m| msg.contains(m)) {
        return IssueKind::Definition;
    }
    if matches!(issue.issue_type, IssueType::Security | IssueType::Performance) {
        return IssueKind::Bypass;
    }
    IssueKind::Unverified
}

lazy_static! {
    static ref QUOTED_NAME: Regex =
        Regex::new(r#"['"`]([A-Za-z_][A-Za-z0-9_]*)['"`]"#).expect("static regex");
    static ref CAPITALIZED_TOKEN: Regex =
        Regex::new(r"\b([A-Z][A-Za-z0-9_]*)\b").expect("static regex");
    static ref LOWER_CAMEL_TOKEN: Regex =
        Regex::new(r"\b([a-z][a-z0-9_]*[A-Z][A-Za-z0-9_]*)\b").expect("static regex");
    static ref DESTRUCTURED_LIST: Regex = Regex::new(r"\{([^}]*)\}").expect("static regex");
}

/// Pulls the identifier an issue message complains about.
///
/// Quoted forms win; otherwise the first capitalized token (import names) or
/// the first lowerCamel token (local identifiers). Known weakness: a proper
/// noun at the start of a sentence can masquerade as an import name.
pub fn extract_identifier(message: &str, kind: IssueKind) -> Option<String> {
    if let Some(c) = QUOTED_NAME.captures(message) {
        return Some(c[1].to_string());
    }
    let fallback = match kind {
        IssueKind::Import => &*CAPITALIZED_TOKEN,
        IssueKind::Definition => &*LOWER_CAMEL_TOKEN,
        _ => return None,
    };
    fallback.captures(message).map(|c| c[1].to_string())
}

/// True when import line `line` provides `name`: substring hit, or a
/// destructured list member whose pre-`as` token equals `name`.
pub fn import_line_matches(line: &str, name: &str) -> bool {
    if line.contains(name) {
        return true;
    }
    if let Some(c) = DESTRUCTURED_LIST.captures(line) {
        for member in c[1].split(',') {
            let imported = member.trim().split_whitespace().next().unwrap_or("");
            if imported == name {
                return true;
            }
        }
    }
    false
}

/// True when `line` defines `name`: variable binding, function declaration,
/// arrow assignment, or a type-level declaration.
pub fn is_definition_line(line: &str, name: &str) -> bool {
    let escaped = regex::escape(name);
    let patterns = [
        format!(r"(?:const|let|var)\s+{escaped}\b"),
        format!(r"function\s+{escaped}\b"),
        format!(r"{escaped}\s*=\s*\("),
        format!(r"(?:class|interface|type|enum)\s+{escaped}\b"),
    ];
    patterns
        .iter()
        .any(|p| Regex::new(p).map(|re| re.is_match(line)).unwrap_or(false))
}

/// Stateless verifier bound to one MR's head commit.
pub struct IssueVerifier<'a> {
    forge: &'a ForgeClient,
    project_id: u64,
    head_sha: &'a str,
}

impl<'a> IssueVerifier<'a> {
    pub fn new(forge: &'a ForgeClient, project_id: u64, head_sha: &'a str) -> Self {
        Self {
            forge,
            project_id,
            head_sha,
        }
    }

    /// Decides whether `issue` survives, using the chunk's context plus
    /// on-demand forge fetches.
    pub async fn verify(&self, issue: &Issue, context: Option<&FileContext>) -> VerificationResult {
        match classify(issue) {
            IssueKind::Bypass => VerificationResult::valid(
                Confidence::High,
                format!("{} issues are not filtered", issue.issue_type.as_str()),
            ),
            IssueKind::Unverified => {
                VerificationResult::valid(Confidence::Medium, "issue type is not verified")
            }
            IssueKind::Import => self.verify_import(issue, context).await,
            IssueKind::Definition => self.verify_definition(issue, context).await,
        }
    }

    async fn verify_import(
        &self,
        issue: &Issue,
        context: Option<&FileContext>,
    ) -> VerificationResult {
        let Some(name) = extract_identifier(&issue.message, IssueKind::Import) else {
            return VerificationResult::valid(
                Confidence::Low,
                "could not extract an import name from the message",
            );
        };

        if issue.message.to_lowercase().contains("duplicate") {
            return self.verify_duplicate_import(&name, context);
        }

        if let Some(ctx) = context.filter(|c| !c.imports.is_empty()) {
            return if ctx.imports.iter().any(|l| import_line_matches(l, &name)) {
                VerificationResult::false_positive(format!(
                    "'{name}' is already imported in this file"
                ))
            } else {
                VerificationResult::valid(
                    Confidence::High,
                    format!("'{name}' is absent from the file's imports"),
                )
            };
        }

        // No imports on hand: pull the whole file and look for the name.
        match self
            .forge
            .get_file_content(self.project_id, &issue.file, self.head_sha)
            .await
        {
            Ok(text) if text.contains(&name) => VerificationResult::false_positive(format!(
                "'{name}' appears in the file content"
            )),
            Ok(_) => VerificationResult::valid(
                Confidence::High,
                format!("'{name}' does not appear in the file"),
            ),
            Err(e) => {
                warn!(file = %issue.file, error = %e, "import verification fetch failed");
                VerificationResult::valid(Confidence::Low, "verification fetch failed")
            }
        }
    }

    fn verify_duplicate_import(
        &self,
        name: &str,
        context: Option<&FileContext>,
    ) -> VerificationResult {
        let Some(ctx) = context.filter(|c| !c.imports.is_empty()) else {
            return VerificationResult::valid(
                Confidence::Low,
                "no import context available for a duplicate check",
            );
        };
        let count = ctx.imports.iter().filter(|l| l.contains(name)).count();
        if count >= 2 {
            VerificationResult::valid(
                Confidence::High,
                format!("'{name}' appears {count} times in the imports"),
            )
        } else {
            VerificationResult::false_positive(format!(
                "'{name}' is imported only once; duplicate claim is wrong"
            ))
        }
    }

    async fn verify_definition(
        &self,
        issue: &Issue,
        context: Option<&FileContext>,
    ) -> VerificationResult {
        let Some(name) = extract_identifier(&issue.message, IssueKind::Definition) else {
            return VerificationResult::valid(
                Confidence::Low,
                "could not extract an identifier from the message",
            );
        };

        if let Some(ctx) = context {
            if ctx.lines.iter().any(|l| is_definition_line(l, &name)) {
                return VerificationResult::false_positive(format!(
                    "'{name}' is defined within the provided context"
                ));
            }
        }

        // Widen the view around the reported line before trusting the claim.
        let extended = match fetch_file_context(
            self.forge,
            self.project_id,
            &issue.file,
            self.head_sha,
            issue.line.max(1),
            EXTENDED_CONTEXT_LINES,
        )
        .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(file = %issue.file, error = %e, "definition verification fetch failed");
                return VerificationResult::valid(Confidence::Low, "verification fetch failed");
            }
        };

        if extended.lines.iter().any(|l| is_definition_line(l, &name)) {
            return VerificationResult::false_positive(format!(
                "'{name}' is defined near line {}",
                issue.line
            ));
        }
        if extended.imports.iter().any(|l| l.contains(name.as_str())) {
            return VerificationResult::false_positive(format!(
                "'{name}' comes from an import"
            ));
        }

        debug!(%name, file = %issue.file, "no definition found; issue stands");
        VerificationResult::valid(
            Confidence::High,
            format!("no definition of '{name}' was found"),
        )
    }
}
