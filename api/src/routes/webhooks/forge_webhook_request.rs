//! Inbound merge-request hook payload.
//!
//! The three sections the pipeline needs are modeled as `Option` so the
//! handler can distinguish "absent section" (400) from transport-level JSON
//! errors. String length caps are enforced in [`validate`].

use serde::Deserialize;

/// Actions that trigger a review; everything else is accepted and skipped.
pub const REVIEWABLE_ACTIONS: [&str; 4] = ["opened", "open", "update", "reopen"];

const CAP_SHORT: usize = 255;
const CAP_TITLE: usize = 500;
const CAP_URL: usize = 1_000;
const CAP_DESCRIPTION: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct ForgeWebhookPayload {
    #[serde(default)]
    pub object_kind: Option<String>,
    #[serde(default)]
    pub object_attributes: Option<MergeRequestAttributes>,
    #[serde(default)]
    pub project: Option<ProjectSection>,
    #[serde(default)]
    pub user: Option<UserSection>,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequestAttributes {
    pub id: i64,
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    pub url: String,
    #[serde(default)]
    pub work_in_progress: bool,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectSection {
    pub id: u64,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserSection {
    pub id: i64,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// The three payload sections the pipeline needs, proven present.
pub struct ValidSections<'a> {
    pub attrs: &'a MergeRequestAttributes,
    pub project: &'a ProjectSection,
    pub user: &'a UserSection,
}

/// Checks section presence and the configured string caps. Returns the
/// offending field name on failure.
pub fn validate(payload: &ForgeWebhookPayload) -> Result<ValidSections<'_>, &'static str> {
    let Some(attrs) = payload.object_attributes.as_ref() else {
        return Err("object_attributes");
    };
    let Some(project) = payload.project.as_ref() else {
        return Err("project");
    };
    let Some(user) = payload.user.as_ref() else {
        return Err("user");
    };

    if attrs.title.len() > CAP_TITLE {
        return Err("object_attributes.title");
    }
    if attrs.description.as_deref().is_some_and(|d| d.len() > CAP_DESCRIPTION) {
        return Err("object_attributes.description");
    }
    if attrs.url.len() > CAP_URL {
        return Err("object_attributes.url");
    }
    if attrs.source_branch.len() > CAP_SHORT || attrs.target_branch.len() > CAP_SHORT {
        return Err("object_attributes.branches");
    }
    if project.name.len() > CAP_SHORT || project.namespace.len() > CAP_SHORT {
        return Err("project");
    }
    if user.username.len() > CAP_SHORT || user.name.len() > CAP_SHORT {
        return Err("user");
    }
    Ok(ValidSections {
        attrs,
        project,
        user,
    })
}

/// Skip rule: WIP merge requests and non-reviewable actions are accepted
/// without starting the pipeline.
pub fn should_skip(attrs: &MergeRequestAttributes) -> bool {
    if attrs.work_in_progress {
        return true;
    }
    match attrs.action.as_deref() {
        Some(action) => !REVIEWABLE_ACTIONS.contains(&action),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_payload() -> ForgeWebhookPayload {
        serde_json::from_value(serde_json::json!({
            "object_kind": "merge_request",
            "object_attributes": {
                "id": 1001, "iid": 12, "title": "Fix rounding",
                "source_branch": "fix/rounding", "target_branch": "main",
                "url": "https://forge.example.com/acme/billing/-/merge_requests/12",
                "work_in_progress": false, "state": "opened", "action": "open"
            },
            "project": {"id": 42, "name": "billing", "namespace": "acme"},
            "user": {"id": 7, "username": "jdoe", "name": "J. Doe"}
        }))
        .unwrap()
    }

    #[test]
    fn complete_payload_validates() {
        assert!(validate(&full_payload()).is_ok());
    }

    #[test]
    fn missing_sections_name_the_culprit() {
        let mut p = full_payload();
        p.object_attributes = None;
        assert_eq!(validate(&p).err(), Some("object_attributes"));

        let mut p = full_payload();
        p.project = None;
        assert_eq!(validate(&p).err(), Some("project"));

        let mut p = full_payload();
        p.user = None;
        assert_eq!(validate(&p).err(), Some("user"));
    }

    #[test]
    fn oversized_strings_are_rejected() {
        let mut p = full_payload();
        p.object_attributes.as_mut().unwrap().title = "t".repeat(501);
        assert_eq!(validate(&p).err(), Some("object_attributes.title"));

        let mut p = full_payload();
        p.object_attributes.as_mut().unwrap().description = Some("d".repeat(10_001));
        assert_eq!(validate(&p).err(), Some("object_attributes.description"));
    }

    #[test]
    fn skip_rules_cover_wip_and_actions() {
        let mut attrs = full_payload().object_attributes.unwrap();
        assert!(!should_skip(&attrs));

        attrs.work_in_progress = true;
        assert!(should_skip(&attrs));
        attrs.work_in_progress = false;

        for action in ["opened", "open", "update", "reopen"] {
            attrs.action = Some(action.into());
            assert!(!should_skip(&attrs), "action {action} should review");
        }
        for action in ["close", "merge", "approved"] {
            attrs.action = Some(action.into());
            assert!(should_skip(&attrs), "action {action} should skip");
        }
        attrs.action = None;
        assert!(should_skip(&attrs));
    }
}
