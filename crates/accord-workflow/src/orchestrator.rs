//! The workflow layer: drives RFC lifecycle operations against the
//! repository backend, enforcing the signing discipline of the ledger and
//! sequencing the asynchronous load-then-merge pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use accord_core::types::{COMMENTER_KEY, COMMENT_KEY, REVIEWER_KEY};
use accord_core::{Action, ActionType, LoadStatus, Rfc, Target, TargetType};
use accord_github::{ListQuery, RepoBackend, ReviewKind, ReviewRequest, ReviewSubmission};

use crate::error::WorkflowError;
use crate::identifier::IdentifierSource;
use crate::loader::SchemaLoader;
use crate::poller::{resolve_mergeability, PollConfig};

/// One row of an RFC listing. The branch name is the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfcSummary {
    pub identifier: String,
    pub title: String,
}

/// A review to apply to an existing RFC.
///
/// `comments` maps target action signatures to comment texts; unknown
/// signatures are attached to the RFC itself rather than dropped. When
/// `load_on_approval` is set, an approval also kicks off the detached
/// load-then-merge pipeline under the machine identity.
#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub identifier: String,
    pub kind: ReviewKind,
    pub top_level_comment: Option<String>,
    pub comments: BTreeMap<String, Vec<String>>,
    pub load_on_approval: bool,
}

/// Coordinates the RFC lifecycle across two backend identities: `user` acts
/// on behalf of the caller (submissions, reviews), `machine` performs the
/// administrative work (merges, tags, status reads) that must not depend on
/// any individual user's permissions.
pub struct Orchestrator {
    user: Arc<dyn RepoBackend>,
    machine: Arc<dyn RepoBackend>,
    loader: Arc<dyn SchemaLoader>,
    identifiers: IdentifierSource,
    poll: PollConfig,
}

impl Orchestrator {
    pub fn new(
        user: Arc<dyn RepoBackend>,
        machine: Arc<dyn RepoBackend>,
        loader: Arc<dyn SchemaLoader>,
    ) -> Self {
        Self {
            user,
            machine,
            loader,
            identifiers: IdentifierSource::default(),
            poll: PollConfig::default(),
        }
    }

    pub fn with_identifiers(mut self, identifiers: IdentifierSource) -> Self {
        self.identifiers = identifiers;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Submit a new RFC: mint an identifier, sign everything, create the
    /// workspace branch, write the artifact, and open the review request.
    ///
    /// If any step after branch creation fails, the branch is revoked so no
    /// orphaned workspace is left behind; the original failure is returned,
    /// not the outcome of the revocation.
    pub async fn submit(&self, mut rfc: Rfc) -> Result<String, WorkflowError> {
        let identifier = self.identifiers.mint();
        rfc.identifier = identifier.clone();
        rfc.sign_actions()?;
        rfc.refresh_signature()?;

        info!(rfc = %identifier, actions = rfc.actions.len(), "submitting RFC");
        self.user.create_branch(&identifier).await?;

        if let Err(err) = self.user.create_rfc_file(&identifier, &rfc).await {
            warn!(rfc = %identifier, "artifact write failed, revoking workspace");
            self.revoke(&identifier).await;
            return Err(err.into());
        }

        if let Err(err) = self.user.open_review_request(&identifier).await {
            warn!(rfc = %identifier, "review request failed, revoking workspace");
            self.revoke(&identifier).await;
            return Err(err.into());
        }

        Ok(identifier)
    }

    /// Replace the RFC's content with a new action list.
    ///
    /// Comments from the stored artifact are carried over with their original
    /// signatures; everything else is replaced wholesale. Any standing
    /// approvals are dismissed afterwards, since they no longer refer to the
    /// current content.
    pub async fn update(&self, identifier: &str, mut rfc: Rfc) -> Result<(), WorkflowError> {
        let request = self.user.review_request(identifier).await?;
        let stored = self.user.rfc_contents(identifier).await?;
        let existing = parse_rfc(identifier, &stored.body)?;

        rfc.identifier = identifier.to_string();
        rfc.sign_actions()?;
        rfc.carry_persistent_actions(&existing);
        rfc.refresh_signature()?;

        self.user.update_rfc_file(&request, &rfc).await?;

        let reviews = self.user.reviews(&request).await?;
        self.user.dismiss_approvals(&request, &reviews).await?;

        info!(rfc = %identifier, "updated RFC content");
        Ok(())
    }

    /// Apply a review: record it in the ledger, persist the artifact, and
    /// submit the backend review. Approvals with `load_on_approval` hand off
    /// to the detached load-then-merge pipeline.
    pub async fn review(&self, input: ReviewInput) -> Result<String, WorkflowError> {
        let top_level = input
            .top_level_comment
            .clone()
            .filter(|text| !text.is_empty());

        // Comment and request-changes reviews without any substance are
        // rejected before the backend sees anything.
        if matches!(input.kind, ReviewKind::Comment | ReviewKind::RequestChanges)
            && top_level.is_none()
            && input.comments.values().all(|texts| texts.is_empty())
        {
            return Err(WorkflowError::Validation(format!(
                "a {} review must include a top-level comment or inline comments",
                input.kind.as_event()
            )));
        }

        let request = self.user.review_request(&input.identifier).await?;
        let login = self.user.user_login().await?;
        let stored = self.user.rfc_contents(&input.identifier).await?;
        let mut rfc = parse_rfc(&input.identifier, &stored.body)?;

        // Later appends target the signature the reviewer actually saw.
        let reviewed_signature = rfc.signature.clone();
        rfc.attach_comments(&input.comments, &login)?;

        // A bare comment review with only inline comments records no extra
        // action; the attached comments are the record.
        if input.kind != ReviewKind::Comment || top_level.is_some() {
            let author_key = match input.kind {
                ReviewKind::Comment => COMMENTER_KEY,
                ReviewKind::Approve | ReviewKind::RequestChanges => REVIEWER_KEY,
            };
            let action_type = match input.kind {
                ReviewKind::Approve => ActionType::Approve,
                ReviewKind::RequestChanges => ActionType::RequestChanges,
                ReviewKind::Comment => ActionType::Comment,
            };
            let mut action = Action::new(
                action_type,
                Some(Target::by_signature(
                    TargetType::Rfc,
                    reviewed_signature.clone(),
                )),
            )
            .with_data(author_key, login.as_str());
            if let Some(text) = &top_level {
                action = action.with_data(COMMENT_KEY, text.as_str());
            }
            rfc.append_action(action)?;
        }

        rfc.refresh_signature()?;
        self.user.update_rfc_file(&request, &rfc).await?;

        let submission = ReviewSubmission {
            identifier: input.identifier.clone(),
            kind: input.kind,
            body: top_level,
            comments: input.comments.values().flatten().cloned().collect(),
        };
        self.user.create_review(&request, &submission).await?;

        if input.kind == ReviewKind::Approve && input.load_on_approval {
            self.spawn_load_and_merge(request, rfc, input.identifier.clone());
            Ok(format!(
                "approved RFC {}; load requested, poll /status for progress",
                input.identifier
            ))
        } else {
            Ok(format!(
                "reviewed RFC {} with type {}",
                input.identifier,
                input.kind.as_event()
            ))
        }
    }

    /// Merge an already-approved RFC under the machine identity and tag the
    /// resulting commit with the RFC identifier.
    pub async fn merge(&self, identifier: &str) -> Result<(), WorkflowError> {
        let request = self.machine.review_request(identifier).await?;
        run_merge(self.machine.as_ref(), &request, identifier).await
    }

    /// Record a load request and hand the actual load to a detached task.
    ///
    /// The `load_requested` status is persisted synchronously so a trace
    /// exists even if the detached load never completes.
    pub async fn request_load(&self, identifier: &str) -> Result<(), WorkflowError> {
        let requester = self.user.user_login().await?;
        let request = self.user.review_request(identifier).await?;
        let stored = self.user.rfc_contents(identifier).await?;
        let mut rfc = parse_rfc(identifier, &stored.body)?;

        rfc.upsert_load_status(LoadStatus::LoadRequested, &requester)?;
        rfc.refresh_signature()?;
        self.user.update_rfc_file(&request, &rfc).await?;

        let backend = Arc::clone(&self.user);
        let loader = Arc::clone(&self.loader);
        let identifier = identifier.to_string();
        tokio::spawn(async move {
            let mut rfc = rfc;
            if let Err(err) = run_load(
                backend.as_ref(),
                loader.as_ref(),
                &request,
                &mut rfc,
                &requester,
            )
            .await
            {
                error!(rfc = %identifier, error = %err, "load failed");
            }
        });

        Ok(())
    }

    /// Current load status of an RFC, if a load was ever requested.
    pub async fn status(&self, identifier: &str) -> Result<Option<String>, WorkflowError> {
        let stored = self.machine.rfc_contents(identifier).await?;
        let rfc = parse_rfc(identifier, &stored.body)?;
        Ok(rfc.current_load_status().map(str::to_string))
    }

    /// List RFCs known to the tracking repository.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<RfcSummary>, WorkflowError> {
        let requests = self.machine.list_review_requests(query).await?;
        Ok(requests
            .into_iter()
            .map(|request| RfcSummary {
                identifier: request.branch,
                title: request.title,
            })
            .collect())
    }

    /// Raw stored artifact body for an RFC.
    pub async fn contents(&self, identifier: &str) -> Result<String, WorkflowError> {
        Ok(self.machine.rfc_contents(identifier).await?.body)
    }

    /// Compensation for a failed submission. Best effort: a failed revocation
    /// is logged loudly but never masks the original error.
    async fn revoke(&self, identifier: &str) {
        match self.user.delete_branch(identifier).await {
            Ok(()) => info!(rfc = %identifier, "revoked RFC workspace"),
            Err(err) => {
                error!(rfc = %identifier, error = %err, "failed to revoke RFC workspace, delete the branch manually")
            }
        }
    }

    /// Run the load-then-merge pipeline on a detached task under the machine
    /// identity, so neither the caller's permissions nor the request's
    /// cancellation can interfere with it mid-sequence.
    fn spawn_load_and_merge(&self, request: ReviewRequest, rfc: Rfc, identifier: String) {
        let machine = Arc::clone(&self.machine);
        let loader = Arc::clone(&self.loader);
        let poll = self.poll.clone();
        tokio::spawn(async move {
            if let Err(err) = load_and_merge(
                machine.as_ref(),
                loader.as_ref(),
                &poll,
                &request,
                rfc,
                &identifier,
            )
            .await
            {
                error!(rfc = %identifier, error = %err, "load-and-merge failed");
            }
        });
    }
}

fn parse_rfc(identifier: &str, body: &str) -> Result<Rfc, WorkflowError> {
    serde_json::from_str(body).map_err(|source| WorkflowError::MalformedArtifact {
        identifier: identifier.to_string(),
        source,
    })
}

/// Load-then-merge pipeline for an approved RFC.
///
/// Mergeability gates the load: an RFC that cannot merge is closed out as
/// `not_applicable` without touching the schema store. Loading writes to the
/// artifact, which invalidates the prior verdict, so mergeability is resolved
/// a second time before the actual merge.
async fn load_and_merge(
    backend: &dyn RepoBackend,
    loader: &dyn SchemaLoader,
    poll: &PollConfig,
    request: &ReviewRequest,
    mut rfc: Rfc,
    identifier: &str,
) -> Result<(), WorkflowError> {
    let requester = backend.user_login().await?;
    rfc.upsert_load_status(LoadStatus::LoadRequested, &requester)?;
    rfc.refresh_signature()?;
    backend.update_rfc_file(request, &rfc).await?;

    if !resolve_mergeability(backend, request, poll).await? {
        info!(rfc = %identifier, "not mergeable, closing load request as not applicable");
        rfc.upsert_load_status(LoadStatus::NotApplicable, &requester)?;
        rfc.refresh_signature()?;
        backend.update_rfc_file(request, &rfc).await?;
        return Ok(());
    }

    run_load(backend, loader, request, &mut rfc, &requester).await?;

    if !resolve_mergeability(backend, request, poll).await? {
        error!(rfc = %identifier, "loaded but not merged: artifact no longer mergeable after load");
        return Err(WorkflowError::LoadedButNotMerged(identifier.to_string()));
    }

    run_merge(backend, request, identifier).await
}

/// Run a load against the schema store, persisting every status transition
/// before moving on so observers always see the latest truth.
async fn run_load(
    backend: &dyn RepoBackend,
    loader: &dyn SchemaLoader,
    request: &ReviewRequest,
    rfc: &mut Rfc,
    requester: &str,
) -> Result<(), WorkflowError> {
    rfc.upsert_load_status(LoadStatus::Loading, requester)?;
    rfc.refresh_signature()?;
    backend.update_rfc_file(request, rfc).await?;

    let content = serde_json::to_vec(&rfc).map_err(accord_core::CoreError::from)?;
    if let Err(err) = loader.load(&content).await {
        warn!(rfc = %rfc.identifier, error = %err, "schema store load failed");
        rfc.upsert_load_status(LoadStatus::Failed, requester)?;
        rfc.refresh_signature()?;
        backend.update_rfc_file(request, rfc).await?;
        return Err(err.into());
    }

    rfc.upsert_load_status(LoadStatus::Successful, requester)?;
    rfc.refresh_signature()?;
    backend.update_rfc_file(request, rfc).await?;
    Ok(())
}

async fn run_merge(
    backend: &dyn RepoBackend,
    request: &ReviewRequest,
    identifier: &str,
) -> Result<(), WorkflowError> {
    let sha = backend.merge_review_request(request).await?;
    backend.create_tag(&sha, identifier).await?;
    info!(rfc = %identifier, %sha, "merged and tagged RFC");
    Ok(())
}
