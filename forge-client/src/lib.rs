//! Thin adapter over the source-forge REST surface (v4-style API).
//!
//! Endpoints used:
//! - GET  /projects/:id/repository/compare?from=&to=      (cumulative diff)
//! - GET  /projects/:id/merge_requests/:iid               (meta + diff_refs)
//! - GET  /projects/:id/repository/files/:path?ref=       (file content, base64)
//! - POST /projects/:id/merge_requests/:iid/notes         (summary comment)
//! - POST /projects/:id/merge_requests/:iid/discussions   (inline discussion)
//!
//! The client is cheap to clone and safe for concurrent use. A per-process
//! semaphore bounds in-flight calls, and transient failures (timeout, 5xx,
//! connection reset) are retried with a short linear backoff.

pub mod errors;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use errors::{ForgeError, ForgeResult};
use types::{DiffRefs, ForgeDiffFile, InlinePosition, MergeRequestDetails};

/// Max attempts for transient failures (first try included).
const MAX_ATTEMPTS: u32 = 3;

/// Linear backoff step between attempts.
const RETRY_STEP: Duration = Duration::from_millis(200);

/// Default cap on concurrent in-flight forge calls per process.
const DEFAULT_RATE_BUDGET: usize = 8;

#[derive(Debug, Clone)]
pub struct ForgeClient {
    http: Client,
    base_api: String, // e.g. "https://forge.example.com/api/v4"
    token: String,    // "PRIVATE-TOKEN"
    permits: Arc<Semaphore>,
}

impl ForgeClient {
    /// Constructs a client for the given forge host and access token.
    ///
    /// `host` is the bare origin (`https://forge.example.com`); the API
    /// prefix is appended here.
    pub fn new(host: &str, token: String) -> ForgeResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .pool_max_idle_per_host(8)
            .build()?;
        Ok(Self {
            http,
            base_api: format!("{}/api/v4", host.trim_end_matches('/')),
            token,
            permits: Arc::new(Semaphore::new(DEFAULT_RATE_BUDGET)),
        })
    }

    /// Cumulative diff between two commits, one entry per changed file.
    pub async fn compare_commits(
        &self,
        project_id: u64,
        from_sha: &str,
        to_sha: &str,
    ) -> ForgeResult<Vec<ForgeDiffFile>> {
        let _permit = self.acquire().await?;
        self.retrying("compare_commits", || {
            self.compare_commits_once(project_id, from_sha, to_sha)
        })
        .await
    }

    /// MR metadata, including `diff_refs` once the forge has computed them.
    pub async fn get_merge_request(
        &self,
        project_id: u64,
        iid: u64,
    ) -> ForgeResult<MergeRequestDetails> {
        let _permit = self.acquire().await?;
        self.retrying("get_merge_request", || {
            self.get_merge_request_once(project_id, iid)
        })
        .await
    }

    /// Raw file content at a commit. The forge ships it base64-encoded.
    pub async fn get_file_content(
        &self,
        project_id: u64,
        path: &str,
        git_ref: &str,
    ) -> ForgeResult<String> {
        let _permit = self.acquire().await?;
        self.retrying("get_file_content", || {
            self.get_file_content_once(project_id, path, git_ref)
        })
        .await
    }

    /// Posts a general note (summary comment) on the MR. Returns the note id.
    ///
    /// Posts are single-attempt: a retry after an ambiguous failure could
    /// duplicate the comment.
    pub async fn post_mr_note(&self, project_id: u64, iid: u64, body: &str) -> ForgeResult<u64> {
        let _permit = self.acquire().await?;
        self.post_mr_note_once(project_id, iid, body).await
    }

    /// Posts a positioned inline discussion. Returns the discussion id.
    /// Single-attempt, same as [`ForgeClient::post_mr_note`].
    pub async fn post_inline_discussion(
        &self,
        project_id: u64,
        iid: u64,
        body: &str,
        position: &InlinePosition,
    ) -> ForgeResult<String> {
        let _permit = self.acquire().await?;
        self.post_inline_discussion_once(project_id, iid, body, position)
            .await
    }

    // ------------------------------------------------------------------
    // single-attempt calls
    // ------------------------------------------------------------------

    async fn compare_commits_once(
        &self,
        project_id: u64,
        from_sha: &str,
        to_sha: &str,
    ) -> ForgeResult<Vec<ForgeDiffFile>> {
        #[derive(Deserialize)]
        struct CompareResp {
            #[serde(default)]
            diffs: Vec<RawDiffFile>,
        }
        #[derive(Deserialize)]
        struct RawDiffFile {
            old_path: String,
            new_path: String,
            #[serde(default)]
            new_file: bool,
            #[serde(default)]
            renamed_file: bool,
            #[serde(default)]
            deleted_file: bool,
            #[serde(default)]
            diff: Option<String>,
        }

        let url = format!(
            "{}/projects/{}/repository/compare?from={}&to={}",
            self.base_api,
            project_id,
            urlencoding::encode(from_sha),
            urlencoding::encode(to_sha)
        );
        let resp = self.get(&url).await?;
        let parsed: CompareResp = Self::decode_json(resp).await?;

        Ok(parsed
            .diffs
            .into_iter()
            .map(|f| ForgeDiffFile {
                old_path: f.old_path,
                new_path: f.new_path,
                new_file: f.new_file,
                renamed_file: f.renamed_file,
                deleted_file: f.deleted_file,
                diff: f.diff,
            })
            .collect())
    }

    async fn get_merge_request_once(
        &self,
        project_id: u64,
        iid: u64,
    ) -> ForgeResult<MergeRequestDetails> {
        #[derive(Deserialize)]
        struct RawMr {
            title: String,
            state: String,
            web_url: String,
            source_branch: String,
            target_branch: String,
            #[serde(default)]
            diff_refs: Option<RawDiffRefs>,
        }
        #[derive(Deserialize)]
        struct RawDiffRefs {
            base_sha: Option<String>,
            head_sha: Option<String>,
            start_sha: Option<String>,
        }

        let url = format!(
            "{}/projects/{}/merge_requests/{}",
            self.base_api, project_id, iid
        );
        let resp = self.get(&url).await?;
        let raw: RawMr = Self::decode_json(resp).await?;

        // diff_refs with a missing head or base is as useless as no refs.
        let diff_refs = raw.diff_refs.and_then(|r| match (r.base_sha, r.head_sha) {
            (Some(base_sha), Some(head_sha)) => Some(DiffRefs {
                base_sha,
                head_sha,
                start_sha: r.start_sha.unwrap_or_default(),
            }),
            _ => None,
        });

        Ok(MergeRequestDetails {
            title: raw.title,
            state: raw.state,
            web_url: raw.web_url,
            source_branch: raw.source_branch,
            target_branch: raw.target_branch,
            diff_refs,
        })
    }

    async fn get_file_content_once(
        &self,
        project_id: u64,
        path: &str,
        git_ref: &str,
    ) -> ForgeResult<String> {
        #[derive(Deserialize)]
        struct FileResp {
            content: String,
        }

        let url = format!(
            "{}/projects/{}/repository/files/{}?ref={}",
            self.base_api,
            project_id,
            urlencoding::encode(path),
            urlencoding::encode(git_ref)
        );
        let resp = self.get(&url).await?;
        let raw: FileResp = Self::decode_json(resp).await?;
        decode_base64_content(&raw.content)
    }

    async fn post_mr_note_once(&self, project_id: u64, iid: u64, body: &str) -> ForgeResult<u64> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            body: &'a str,
        }
        #[derive(Deserialize)]
        struct NoteResp {
            id: u64,
        }

        let url = format!(
            "{}/projects/{}/merge_requests/{}/notes",
            self.base_api, project_id, iid
        );
        debug!(project_id, iid, "POST mr note");
        let resp = self
            .http
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&Req { body })
            .send()
            .await?;
        let nr: NoteResp = Self::decode_json(resp).await?;
        Ok(nr.id)
    }

    async fn post_inline_discussion_once(
        &self,
        project_id: u64,
        iid: u64,
        body: &str,
        position: &InlinePosition,
    ) -> ForgeResult<String> {
        // The forge "text" position wants old/new path, a stringified
        // new_line, and all three SHAs.
        #[derive(serde::Serialize)]
        struct Position<'a> {
            position_type: &'a str,
            old_path: &'a str,
            new_path: &'a str,
            new_line: String,
            base_sha: &'a str,
            head_sha: &'a str,
            start_sha: &'a str,
        }
        #[derive(serde::Serialize)]
        struct Req<'a> {
            body: &'a str,
            position: Position<'a>,
        }
        #[derive(Deserialize)]
        struct DiscussionResp {
            id: String,
        }

        let url = format!(
            "{}/projects/{}/merge_requests/{}/discussions",
            self.base_api, project_id, iid
        );
        let req = Req {
            body,
            position: Position {
                position_type: "text",
                old_path: &position.old_path,
                new_path: &position.new_path,
                new_line: position.new_line.to_string(),
                base_sha: &position.base_sha,
                head_sha: &position.head_sha,
                start_sha: &position.start_sha,
            },
        };

        debug!(
            project_id,
            iid,
            path = %position.new_path,
            line = position.new_line,
            "POST inline discussion"
        );
        let resp = self
            .http
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&req)
            .send()
            .await?;
        let disc: DiscussionResp = Self::decode_json(resp).await?;
        Ok(disc.id)
    }

    // ------------------------------------------------------------------
    // plumbing
    // ------------------------------------------------------------------

    async fn get(&self, url: &str) -> ForgeResult<reqwest::Response> {
        debug!(%url, "GET");
        let resp = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        Ok(resp)
    }

    /// Maps non-2xx statuses, then decodes the JSON body.
    async fn decode_json<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> ForgeResult<T> {
        let status = resp.status();
        if !status.is_success() {
            let snippet: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(300)
                .collect();
            warn!(%status, %snippet, "forge returned non-success status");
            return Err(status_error(status));
        }
        resp.json::<T>().await.map_err(ForgeError::from)
    }

    async fn acquire(&self) -> ForgeResult<tokio::sync::SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| ForgeError::Network("client permit pool closed".into()))
    }

    /// Bounded retry for transient failures only.
    async fn retrying<T, F, Fut>(&self, op: &'static str, mut call: F) -> ForgeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ForgeResult<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match call().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!(op, attempt, error = %e, "transient forge failure, retrying");
                    tokio::time::sleep(RETRY_STEP * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn status_error(status: StatusCode) -> ForgeError {
    match status.as_u16() {
        401 => ForgeError::Unauthorized,
        403 => ForgeError::Forbidden,
        404 => ForgeError::NotFound,
        429 => ForgeError::RateLimited {
            retry_after_secs: None,
        },
        code @ 500..=599 => ForgeError::Server(code),
        code => ForgeError::HttpStatus(code),
    }
}

/// Decodes the forge's base64 file payload (newline-wrapped at 60 cols).
fn decode_base64_content(content: &str) -> ForgeResult<String> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| ForgeError::InvalidResponse(format!("bad base64 file content: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ForgeError::InvalidResponse(format!("file content is not utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_content_decodes_with_line_wrapping() {
        // "hello\nworld\n" wrapped the way the forge wraps payloads.
        let wrapped = "aGVsbG8K\nd29ybGQK\n";
        assert_eq!(decode_base64_content(wrapped).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn base64_garbage_is_an_invalid_response() {
        assert!(matches!(
            decode_base64_content("!!not-base64!!"),
            Err(ForgeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn status_mapping_covers_the_interesting_codes() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED),
            ForgeError::Unauthorized
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY),
            ForgeError::Server(502)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS),
            ForgeError::RateLimited { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::CONFLICT),
            ForgeError::HttpStatus(409)
        ));
    }
}
