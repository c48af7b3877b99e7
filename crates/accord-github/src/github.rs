//! GitHub implementation of the [`RepoBackend`] capability over the REST API.

use async_trait::async_trait;
use base64::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use accord_core::Rfc;

use crate::backend::*;
use crate::config::GitHubConfig;
use crate::error::BackendError;

const RFC_FILE_NAME: &str = "RFC.json";
const RFC_DIRECTORY: &str = "RFC";
const PER_PAGE: usize = 100;
const USER_AGENT: &str = "accord-rfc-service";
const DISMISS_MESSAGE: &str = "dismissed.";

#[derive(Debug, Clone)]
pub struct GitHubBackend {
    config: GitHubConfig,
    client: reqwest::Client,
}

/// Path of the RFC artifact within its workspace branch.
fn rfc_path(identifier: &str) -> String {
    format!("{RFC_DIRECTORY}/{identifier}/{RFC_FILE_NAME}")
}

/// The contents API returns base64 with embedded newlines.
fn decode_content(content: &str) -> Result<String, BackendError> {
    let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64_STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| BackendError::Decode(format!("artifact content is not valid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| BackendError::Decode(format!("artifact content is not utf-8: {e}")))
}

impl GitHubBackend {
    pub fn new(config: GitHubConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn repo_endpoint(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.config.api_base, self.config.owner, self.config.repo, suffix
        )
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, BackendError> {
        let resp = builder.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("{context}: {status} body={body}")));
        }
        Ok(resp.json().await?)
    }

    async fn send_unit(
        &self,
        builder: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<(), BackendError> {
        let resp = builder.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("{context}: {status} body={body}")));
        }
        Ok(())
    }

    async fn base_branch_sha(&self) -> Result<String, BackendError> {
        let url = self.repo_endpoint(&format!(
            "/branches/{}",
            urlencoding::encode(&self.config.base_branch)
        ));
        let branch: BranchResponse = self
            .send(self.request(reqwest::Method::GET, url), "fetch base branch")
            .await?;
        Ok(branch.commit.sha)
    }

    async fn write_rfc_file(
        &self,
        branch: &str,
        rfc: &Rfc,
        file_sha: Option<String>,
        message: &str,
    ) -> Result<(), BackendError> {
        let payload = serde_json::to_vec(rfc)?;
        let url = self.repo_endpoint(&format!("/contents/{}", rfc_path(branch)));
        let body = FileWriteRequest {
            message: message.to_string(),
            content: BASE64_STANDARD.encode(payload),
            branch: branch.to_string(),
            sha: file_sha,
        };
        self.send_unit(
            self.request(reqwest::Method::PUT, url).json(&body),
            "write artifact",
        )
        .await
    }
}

#[async_trait]
impl RepoBackend for GitHubBackend {
    async fn create_branch(&self, branch: &str) -> Result<(), BackendError> {
        let sha = self.base_branch_sha().await?;
        let url = self.repo_endpoint("/git/refs");
        let body = CreateRefRequest {
            git_ref: format!("refs/heads/{branch}"),
            sha,
        };
        self.send_unit(
            self.request(reqwest::Method::POST, url).json(&body),
            "create branch",
        )
        .await
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), BackendError> {
        let url = self.repo_endpoint(&format!("/git/refs/heads/{}", urlencoding::encode(branch)));
        self.send_unit(self.request(reqwest::Method::DELETE, url), "delete branch")
            .await
    }

    async fn create_rfc_file(&self, branch: &str, rfc: &Rfc) -> Result<(), BackendError> {
        self.write_rfc_file(branch, rfc, None, "init.").await
    }

    async fn update_rfc_file(
        &self,
        request: &ReviewRequest,
        rfc: &Rfc,
    ) -> Result<(), BackendError> {
        // The current blob SHA is required so the write fails instead of
        // silently clobbering a concurrent update.
        let contents = self.rfc_contents(&request.branch).await?;
        self.write_rfc_file(&request.branch, rfc, Some(contents.file_sha), "update.")
            .await
    }

    async fn rfc_contents(&self, branch: &str) -> Result<RfcContents, BackendError> {
        let url = self.repo_endpoint(&format!(
            "/contents/{}?ref={}",
            rfc_path(branch),
            urlencoding::encode(branch)
        ));
        let contents: ContentsResponse = self
            .send(self.request(reqwest::Method::GET, url), "fetch artifact")
            .await?;
        Ok(RfcContents {
            body: decode_content(&contents.content)?,
            file_sha: contents.sha,
        })
    }

    async fn open_review_request(&self, branch: &str) -> Result<(), BackendError> {
        let url = self.repo_endpoint("/pulls");
        let body = NewPullRequest {
            title: format!("RFC: {branch}"),
            head: branch.to_string(),
            base: self.config.base_branch.clone(),
            body: format!("Automated creation of RFC {branch} review request"),
        };
        self.send_unit(
            self.request(reqwest::Method::POST, url).json(&body),
            "open review request",
        )
        .await
    }

    async fn review_request(&self, branch: &str) -> Result<ReviewRequest, BackendError> {
        let url = self.repo_endpoint(&format!(
            "/pulls?state=all&head={}:{}",
            urlencoding::encode(&self.config.owner),
            urlencoding::encode(branch)
        ));
        let pulls: Vec<PullResponse> = self
            .send(self.request(reqwest::Method::GET, url), "fetch review request")
            .await?;
        match <[PullResponse; 1]>::try_from(pulls) {
            Ok([pull]) => Ok(pull.into_request()),
            Err(_) => Err(BackendError::AmbiguousReviewRequest(branch.to_string())),
        }
    }

    async fn refresh_review_request(
        &self,
        request: &ReviewRequest,
    ) -> Result<ReviewRequest, BackendError> {
        // A direct single-item fetch is the only one that carries the
        // recomputed mergeable state; list fetches never do.
        let url = self.repo_endpoint(&format!("/pulls/{}", request.number));
        let pull: PullResponse = self
            .send(
                self.request(reqwest::Method::GET, url),
                "refresh review request",
            )
            .await?;
        Ok(pull.into_request())
    }

    async fn list_review_requests(
        &self,
        query: &ListQuery,
    ) -> Result<Vec<ReviewRequest>, BackendError> {
        let per_page = query.count.map_or(PER_PAGE, |c| c.clamp(1, PER_PAGE));
        let mut out = Vec::new();
        let mut page = 1usize;

        loop {
            let url = self.repo_endpoint(&format!(
                "/pulls?state={}&per_page={}&page={}",
                query.state.as_str(),
                per_page,
                page
            ));
            let pulls: Vec<PullResponse> = self
                .send(self.request(reqwest::Method::GET, url), "list review requests")
                .await?;
            let fetched = pulls.len();

            for pull in pulls {
                let request = pull.into_request();
                if let Some(owner) = &query.owner {
                    if request.author.as_deref() != Some(owner.as_str()) {
                        continue;
                    }
                }
                if let Some(merged) = query.merged {
                    if request.merged != merged {
                        continue;
                    }
                }
                if query.count.is_some_and(|count| out.len() >= count) {
                    break;
                }
                out.push(request);
            }

            if query.count.is_some_and(|count| out.len() >= count) || fetched < per_page {
                break;
            }
            page += 1;
        }

        debug!(results = out.len(), "listed review requests");
        Ok(out)
    }

    async fn combined_check_state(
        &self,
        request: &ReviewRequest,
    ) -> Result<CheckState, BackendError> {
        let url = self.repo_endpoint(&format!(
            "/commits/{}/status",
            urlencoding::encode(&request.branch)
        ));
        let status: CombinedStatusResponse = self
            .send(self.request(reqwest::Method::GET, url), "fetch combined status")
            .await?;
        Ok(CheckState::from_api(&status.state))
    }

    async fn merge_review_request(
        &self,
        request: &ReviewRequest,
    ) -> Result<String, BackendError> {
        let url = self.repo_endpoint(&format!("/pulls/{}/merge", request.number));
        let body = MergeParams {
            commit_message: String::new(),
        };
        let result: MergeResponse = self
            .send(
                self.request(reqwest::Method::PUT, url).json(&body),
                "merge review request",
            )
            .await?;
        Ok(result.sha)
    }

    async fn reviews(&self, request: &ReviewRequest) -> Result<Vec<Review>, BackendError> {
        let url = self.repo_endpoint(&format!(
            "/pulls/{}/reviews?per_page={}",
            request.number, PER_PAGE
        ));
        let reviews: Vec<ReviewResponse> = self
            .send(self.request(reqwest::Method::GET, url), "list reviews")
            .await?;
        Ok(reviews
            .into_iter()
            .map(|r| Review {
                id: r.id,
                verdict: r.state,
                reviewer: r.user.map(|u| u.login),
            })
            .collect())
    }

    async fn create_review(
        &self,
        request: &ReviewRequest,
        submission: &ReviewSubmission,
    ) -> Result<(), BackendError> {
        // All inline comments attach to the single artifact file; the RFC is
        // one JSON line, so position 1 is the only addressable spot.
        let path = rfc_path(&submission.identifier);
        let comments: Vec<DraftComment> = submission
            .comments
            .iter()
            .map(|text| DraftComment {
                path: path.clone(),
                body: text.clone(),
                position: 1,
            })
            .collect();

        let url = self.repo_endpoint(&format!("/pulls/{}/reviews", request.number));
        let body = ReviewRequestPayload {
            event: submission.kind.as_event().to_string(),
            body: submission.body.clone(),
            comments,
        };
        self.send_unit(
            self.request(reqwest::Method::POST, url).json(&body),
            "create review",
        )
        .await
    }

    async fn dismiss_approvals(
        &self,
        request: &ReviewRequest,
        reviews: &[Review],
    ) -> Result<(), BackendError> {
        for review in reviews.iter().filter(|r| r.is_approval()) {
            let url = self.repo_endpoint(&format!(
                "/pulls/{}/reviews/{}/dismissals",
                request.number, review.id
            ));
            let body = DismissRequest {
                message: DISMISS_MESSAGE.to_string(),
            };
            self.send_unit(
                self.request(reqwest::Method::PUT, url).json(&body),
                "dismiss review",
            )
            .await?;
        }
        Ok(())
    }

    async fn user_login(&self) -> Result<String, BackendError> {
        let url = format!("{}/user", self.config.api_base);
        let user: UserResponse = self
            .send(self.request(reqwest::Method::GET, url), "fetch user")
            .await?;
        Ok(user.login)
    }

    async fn create_tag(&self, sha: &str, name: &str) -> Result<(), BackendError> {
        let url = self.repo_endpoint("/git/refs");
        let body = CreateRefRequest {
            git_ref: format!("refs/tags/{name}"),
            sha: sha.to_string(),
        };
        self.send_unit(
            self.request(reqwest::Method::POST, url).json(&body),
            "create tag",
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct FileWriteRequest {
    message: String,
    content: String,
    branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewPullRequest {
    title: String,
    head: String,
    base: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    head: HeadRef,
    #[serde(default)]
    user: Option<UserResponse>,
    // Single-item fetches carry `merged`; list fetches only `merged_at`.
    #[serde(default)]
    merged: Option<bool>,
    #[serde(default)]
    merged_at: Option<String>,
    #[serde(default)]
    mergeable_state: Option<String>,
}

impl PullResponse {
    fn into_request(self) -> ReviewRequest {
        let merged = self.merged.unwrap_or(self.merged_at.is_some());
        ReviewRequest {
            number: self.number,
            branch: self.head.branch,
            title: self.title.unwrap_or_default(),
            author: self.user.map(|u| u.login),
            merged,
            merge_state: self.mergeable_state.as_deref().map(MergeState::from_api),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HeadRef {
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct CombinedStatusResponse {
    state: String,
}

#[derive(Debug, Serialize)]
struct MergeParams {
    commit_message: String,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    id: u64,
    state: ReviewVerdict,
    #[serde(default)]
    user: Option<UserResponse>,
}

#[derive(Debug, Serialize)]
struct ReviewRequestPayload {
    event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    comments: Vec<DraftComment>,
}

#[derive(Debug, Serialize)]
struct DraftComment {
    path: String,
    body: String,
    position: u32,
}

#[derive(Debug, Serialize)]
struct DismissRequest {
    message: String,
}
