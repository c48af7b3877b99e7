use std::time::Duration;

use tracing::debug;

use accord_github::{CheckState, MergeState, RepoBackend, ReviewRequest};

use crate::error::WorkflowError;

/// Bounded retry settings for resolving mergeability.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: Duration::from_secs(10),
        }
    }
}

/// Resolve a yes/no mergeability verdict for a review request.
///
/// Two settle loops run in sequence, each bounded by `max_attempts`:
/// first wait for combined checks to leave `pending`, then re-fetch the
/// request until the backend has computed a mergeable state. The backend
/// only reports a mergeable state on a direct single-request fetch, so the
/// second loop must go through [`RepoBackend::refresh_review_request`].
///
/// Exhausting the second loop without a settled state is an error, never a
/// "not mergeable" verdict.
pub async fn resolve_mergeability(
    backend: &dyn RepoBackend,
    request: &ReviewRequest,
    config: &PollConfig,
) -> Result<bool, WorkflowError> {
    for attempt in 0..config.max_attempts {
        let checks = backend.combined_check_state(request).await?;
        if checks != CheckState::Pending {
            break;
        }
        debug!(branch = %request.branch, attempt, "checks still pending");
        tokio::time::sleep(config.wait).await;
    }

    let mut state = None;
    for attempt in 0..config.max_attempts {
        let fresh = backend.refresh_review_request(request).await?;
        state = fresh.merge_state;
        match state {
            Some(MergeState::Unknown) | None => {
                debug!(branch = %request.branch, attempt, "mergeable state not yet computed");
                tokio::time::sleep(config.wait).await;
            }
            Some(_) => break,
        }
    }

    match state {
        Some(MergeState::Unknown) | None => Err(WorkflowError::MergeabilityUndetermined(
            request.branch.clone(),
        )),
        Some(settled) => Ok(settled == MergeState::Clean),
    }
}
