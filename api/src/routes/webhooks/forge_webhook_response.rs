//! Success bodies for the webhook route.

use serde::Serialize;

/// Accepted delivery. `review_id` is present once a review row exists;
/// `processed:false` marks deliveries we acknowledged but ignored
/// (non-MR events).
#[derive(Debug, Serialize)]
pub struct ForgeWebhookResponse {
    pub success: bool,
    #[serde(rename = "reviewId", skip_serializing_if = "Option::is_none")]
    pub review_id: Option<String>,
    #[serde(rename = "mergeRequestIid", skip_serializing_if = "Option::is_none")]
    pub merge_request_iid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
}

impl ForgeWebhookResponse {
    pub fn ignored() -> Self {
        Self {
            success: true,
            review_id: None,
            merge_request_iid: None,
            status: None,
            processed: Some(false),
        }
    }

    pub fn skipped(merge_request_iid: u64) -> Self {
        Self {
            success: true,
            review_id: None,
            merge_request_iid: Some(merge_request_iid),
            status: Some("skipped".to_string()),
            processed: Some(false),
        }
    }

    pub fn accepted(review_id: String, merge_request_iid: u64) -> Self {
        Self {
            success: true,
            review_id: Some(review_id),
            merge_request_iid: Some(merge_request_iid),
            status: Some("PENDING".to_string()),
            processed: Some(true),
        }
    }
}
