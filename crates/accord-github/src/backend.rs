//! The Repository Backend capability: branch/file/review-request/review/tag
//! primitives against a version-control hosting service. The workflow layer
//! only ever talks to this trait; one conforming implementation exists per
//! hosting provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use accord_core::Rfc;

use crate::error::BackendError;

/// Review verdict submitted through the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewKind {
    Approve,
    RequestChanges,
    Comment,
}

impl ReviewKind {
    /// Wire form expected by the hosting provider's review API.
    pub fn as_event(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::RequestChanges => "REQUEST_CHANGES",
            Self::Comment => "COMMENT",
        }
    }
}

/// State of an already-submitted review on a review request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ReviewVerdict {
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "CHANGES_REQUESTED")]
    ChangesRequested,
    #[serde(rename = "COMMENTED")]
    Commented,
    #[serde(rename = "DISMISSED")]
    Dismissed,
    #[serde(other)]
    Other,
}

/// Backend-computed, eventually-consistent merge verdict for a review
/// request. Only `Clean` is mergeable; `Unknown` means the backend has not
/// finished recomputing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Clean,
    Behind,
    Blocked,
    Dirty,
    Draft,
    Unstable,
    Unknown,
}

impl MergeState {
    pub fn from_api(state: &str) -> Self {
        match state {
            "clean" => Self::Clean,
            "behind" => Self::Behind,
            "blocked" => Self::Blocked,
            "dirty" => Self::Dirty,
            "draft" => Self::Draft,
            "unstable" => Self::Unstable,
            _ => Self::Unknown,
        }
    }
}

/// Combined check/status state for a review request's branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Success,
    Pending,
    Failure,
}

impl CheckState {
    pub fn from_api(state: &str) -> Self {
        match state {
            "success" => Self::Success,
            "pending" => Self::Pending,
            _ => Self::Failure,
        }
    }
}

/// A review request (pull request) as reported by the backend.
///
/// A plain data handle rather than a provider-specific type: number and
/// branch are all the workflow needs to address it in later calls.
/// `merge_state` is only populated by [`RepoBackend::refresh_review_request`];
/// list-based fetches do not carry the recomputed state.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub number: u64,
    pub branch: String,
    pub title: String,
    pub author: Option<String>,
    pub merged: bool,
    pub merge_state: Option<MergeState>,
}

/// An existing review on a review request.
#[derive(Debug, Clone)]
pub struct Review {
    pub id: u64,
    pub verdict: ReviewVerdict,
    pub reviewer: Option<String>,
}

impl Review {
    pub fn is_approval(&self) -> bool {
        self.verdict == ReviewVerdict::Approved
    }
}

/// A review to submit, already flattened for the backend: per-action comment
/// texts all attach to the single RFC artifact file.
#[derive(Debug, Clone)]
pub struct ReviewSubmission {
    pub identifier: String,
    pub kind: ReviewKind,
    pub body: Option<String>,
    pub comments: Vec<String>,
}

/// Raw stored artifact body plus its revision marker (blob SHA), which the
/// backend's optimistic-concurrency check requires on writes.
#[derive(Debug, Clone)]
pub struct RfcContents {
    pub body: String,
    pub file_sha: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Open,
    Closed,
    #[default]
    All,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

/// Filters for listing review requests. `count: None` exhausts pagination.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub state: RequestState,
    pub count: Option<usize>,
    pub owner: Option<String>,
    pub merged: Option<bool>,
}

/// All operations the workflow needs from a hosting provider.
///
/// Branch names double as RFC identifiers: every RFC lives in its own
/// workspace branch, created from the configured base line, holding the
/// serialized RFC as its sole artifact.
#[async_trait]
pub trait RepoBackend: Send + Sync {
    /// Create a new branch with the given name from the configured base.
    async fn create_branch(&self, branch: &str) -> Result<(), BackendError>;

    /// Delete the branch with the given name.
    async fn delete_branch(&self, branch: &str) -> Result<(), BackendError>;

    /// Create the RFC artifact on the given branch.
    async fn create_rfc_file(&self, branch: &str, rfc: &Rfc) -> Result<(), BackendError>;

    /// Commit new RFC artifact contents to the review request's branch,
    /// subject to the artifact's current revision marker.
    async fn update_rfc_file(
        &self,
        request: &ReviewRequest,
        rfc: &Rfc,
    ) -> Result<(), BackendError>;

    /// Current RFC artifact contents for the given branch.
    async fn rfc_contents(&self, branch: &str) -> Result<RfcContents, BackendError>;

    /// Open a review request from the given branch towards the base line.
    async fn open_review_request(&self, branch: &str) -> Result<(), BackendError>;

    /// The review request for the given branch; errors unless exactly one
    /// exists.
    async fn review_request(&self, branch: &str) -> Result<ReviewRequest, BackendError>;

    /// Re-fetch a single review request directly so its recomputed merge
    /// state is populated.
    async fn refresh_review_request(
        &self,
        request: &ReviewRequest,
    ) -> Result<ReviewRequest, BackendError>;

    /// List review requests matching the query, paginated internally.
    async fn list_review_requests(
        &self,
        query: &ListQuery,
    ) -> Result<Vec<ReviewRequest>, BackendError>;

    /// Combined check/status state for the review request's branch.
    async fn combined_check_state(
        &self,
        request: &ReviewRequest,
    ) -> Result<CheckState, BackendError>;

    /// Merge the review request into the base line; returns the resulting
    /// commit SHA.
    async fn merge_review_request(&self, request: &ReviewRequest)
        -> Result<String, BackendError>;

    /// All reviews on the given review request.
    async fn reviews(&self, request: &ReviewRequest) -> Result<Vec<Review>, BackendError>;

    /// Submit a review.
    async fn create_review(
        &self,
        request: &ReviewRequest,
        submission: &ReviewSubmission,
    ) -> Result<(), BackendError>;

    /// Dismiss every approval review among the given reviews.
    async fn dismiss_approvals(
        &self,
        request: &ReviewRequest,
        reviews: &[Review],
    ) -> Result<(), BackendError>;

    /// Login of the authenticated identity.
    async fn user_login(&self) -> Result<String, BackendError>;

    /// Create a permanent tag at the given commit SHA.
    async fn create_tag(&self, sha: &str, name: &str) -> Result<(), BackendError>;
}
