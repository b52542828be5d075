//! Normalized data model for the forge REST surface.
//!
//! These types are the "wire-free" output of the client: later stages
//! (diff processing, verification, publishing) consume them without knowing
//! forge response shapes.

use serde::{Deserialize, Serialize};

/// Triple of SHAs used to bind inline comments reliably.
///
/// The forge exposes base/start/head once the MR has been diffed server-side;
/// a freshly pushed MR may not have them yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRefs {
    pub base_sha: String,
    pub head_sha: String,
    pub start_sha: String,
}

/// High-level metadata for a merge request (title, branches, diff refs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequestDetails {
    pub title: String,
    pub state: String,
    pub web_url: String,
    pub source_branch: String,
    pub target_branch: String,
    /// Absent while the forge has not computed the MR diff yet.
    pub diff_refs: Option<DiffRefs>,
}

/// One file entry from the compare-commits endpoint.
///
/// `diff` is the unified-diff text for this file; `None` for binary patches
/// the forge refuses to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeDiffFile {
    pub old_path: String,
    pub new_path: String,
    pub new_file: bool,
    pub renamed_file: bool,
    pub deleted_file: bool,
    pub diff: Option<String>,
}

/// Position of an inline discussion on the new side of a diff.
///
/// All three SHAs are required by the forge; `new_line` addresses the
/// new-file line space.
#[derive(Debug, Clone)]
pub struct InlinePosition {
    pub old_path: String,
    pub new_path: String,
    pub new_line: u32,
    pub base_sha: String,
    pub head_sha: String,
    pub start_sha: String,
}
