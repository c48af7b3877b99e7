//! End-to-end workflow scenarios against an in-memory repository backend.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use accord_core::types::{COMMENTER_KEY, COMMENT_KEY, NOTE_KEY, REVIEWER_KEY};
use accord_core::{Action, ActionType, Rfc, Target, TargetType};
use accord_github::{
    BackendError, CheckState, ListQuery, MergeState, RepoBackend, Review, ReviewKind,
    ReviewRequest, ReviewSubmission, ReviewVerdict, RfcContents,
};
use accord_workflow::{
    resolve_mergeability, IdentifierSource, LogOnlyLoader, Orchestrator, PollConfig, ReviewInput,
    WorkflowError,
};

const LOGIN: &str = "octocat";
const RFC_ID: &str = "1700000000";

#[derive(Default)]
struct MockState {
    branches: Vec<String>,
    files: HashMap<String, String>,
    attempted_writes: Vec<String>,
    requests: HashMap<String, ReviewRequest>,
    next_number: u64,
    reviews: Vec<Review>,
    submitted_reviews: Vec<ReviewSubmission>,
    dismissed: Vec<u64>,
    merged: Vec<String>,
    tags: Vec<(String, String)>,
    calls: Vec<&'static str>,
    check_states: VecDeque<CheckState>,
    merge_states: VecDeque<Option<MergeState>>,
    fail_create_file: bool,
    fail_open_request: bool,
    fail_update_file: bool,
}

struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                next_number: 1,
                ..MockState::default()
            }),
        })
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Seed a branch with an already-open review request and a stored RFC.
    fn seed(&self, branch: &str, rfc: &Rfc) {
        self.with(|s| {
            let number = s.next_number;
            s.next_number += 1;
            s.branches.push(branch.to_string());
            s.files
                .insert(branch.to_string(), serde_json::to_string(rfc).unwrap());
            s.requests.insert(
                branch.to_string(),
                ReviewRequest {
                    number,
                    branch: branch.to_string(),
                    title: format!("RFC {branch}"),
                    author: Some(LOGIN.to_string()),
                    merged: false,
                    merge_state: None,
                },
            );
        });
    }

    fn stored_rfc(&self, branch: &str) -> Rfc {
        self.with(|s| serde_json::from_str(&s.files[branch]).unwrap())
    }
}

#[async_trait]
impl RepoBackend for MockBackend {
    async fn create_branch(&self, branch: &str) -> Result<(), BackendError> {
        self.with(|s| {
            s.calls.push("create_branch");
            s.branches.push(branch.to_string());
            Ok(())
        })
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), BackendError> {
        self.with(|s| {
            s.calls.push("delete_branch");
            s.branches.retain(|b| b != branch);
            Ok(())
        })
    }

    async fn create_rfc_file(&self, branch: &str, rfc: &Rfc) -> Result<(), BackendError> {
        let body = serde_json::to_string(rfc)?;
        self.with(|s| {
            s.calls.push("create_rfc_file");
            if s.fail_create_file {
                return Err(BackendError::Api("injected write failure".to_string()));
            }
            s.files.insert(branch.to_string(), body);
            Ok(())
        })
    }

    async fn update_rfc_file(
        &self,
        request: &ReviewRequest,
        rfc: &Rfc,
    ) -> Result<(), BackendError> {
        let body = serde_json::to_string(rfc)?;
        self.with(|s| {
            s.calls.push("update_rfc_file");
            s.attempted_writes.push(body.clone());
            if s.fail_update_file {
                return Err(BackendError::Api("injected update failure".to_string()));
            }
            s.files.insert(request.branch.clone(), body);
            Ok(())
        })
    }

    async fn rfc_contents(&self, branch: &str) -> Result<RfcContents, BackendError> {
        self.with(|s| {
            s.calls.push("rfc_contents");
            s.files
                .get(branch)
                .map(|body| RfcContents {
                    body: body.clone(),
                    file_sha: "filesha".to_string(),
                })
                .ok_or_else(|| BackendError::Api(format!("no artifact on {branch}")))
        })
    }

    async fn open_review_request(&self, branch: &str) -> Result<(), BackendError> {
        self.with(|s| {
            s.calls.push("open_review_request");
            if s.fail_open_request {
                return Err(BackendError::Api("injected open failure".to_string()));
            }
            let number = s.next_number;
            s.next_number += 1;
            s.requests.insert(
                branch.to_string(),
                ReviewRequest {
                    number,
                    branch: branch.to_string(),
                    title: format!("RFC {branch}"),
                    author: Some(LOGIN.to_string()),
                    merged: false,
                    merge_state: None,
                },
            );
            Ok(())
        })
    }

    async fn review_request(&self, branch: &str) -> Result<ReviewRequest, BackendError> {
        self.with(|s| {
            s.calls.push("review_request");
            s.requests
                .get(branch)
                .cloned()
                .ok_or_else(|| BackendError::AmbiguousReviewRequest(branch.to_string()))
        })
    }

    async fn refresh_review_request(
        &self,
        request: &ReviewRequest,
    ) -> Result<ReviewRequest, BackendError> {
        self.with(|s| {
            s.calls.push("refresh_review_request");
            let mut fresh = request.clone();
            fresh.merge_state = s
                .merge_states
                .pop_front()
                .unwrap_or(Some(MergeState::Clean));
            Ok(fresh)
        })
    }

    async fn list_review_requests(
        &self,
        _query: &ListQuery,
    ) -> Result<Vec<ReviewRequest>, BackendError> {
        self.with(|s| {
            let mut requests: Vec<ReviewRequest> = s.requests.values().cloned().collect();
            requests.sort_by_key(|r| r.number);
            Ok(requests)
        })
    }

    async fn combined_check_state(
        &self,
        _request: &ReviewRequest,
    ) -> Result<CheckState, BackendError> {
        self.with(|s| {
            s.calls.push("combined_check_state");
            Ok(s.check_states.pop_front().unwrap_or(CheckState::Success))
        })
    }

    async fn merge_review_request(
        &self,
        request: &ReviewRequest,
    ) -> Result<String, BackendError> {
        self.with(|s| {
            s.calls.push("merge_review_request");
            s.merged.push(request.branch.clone());
            Ok("abc123sha".to_string())
        })
    }

    async fn reviews(&self, _request: &ReviewRequest) -> Result<Vec<Review>, BackendError> {
        self.with(|s| {
            s.calls.push("reviews");
            Ok(s.reviews.clone())
        })
    }

    async fn create_review(
        &self,
        _request: &ReviewRequest,
        submission: &ReviewSubmission,
    ) -> Result<(), BackendError> {
        self.with(|s| {
            s.calls.push("create_review");
            s.submitted_reviews.push(submission.clone());
            Ok(())
        })
    }

    async fn dismiss_approvals(
        &self,
        _request: &ReviewRequest,
        reviews: &[Review],
    ) -> Result<(), BackendError> {
        self.with(|s| {
            s.calls.push("dismiss_approvals");
            for review in reviews.iter().filter(|r| r.is_approval()) {
                s.dismissed.push(review.id);
            }
            Ok(())
        })
    }

    async fn user_login(&self) -> Result<String, BackendError> {
        Ok(LOGIN.to_string())
    }

    async fn create_tag(&self, sha: &str, name: &str) -> Result<(), BackendError> {
        self.with(|s| {
            s.calls.push("create_tag");
            s.tags.push((sha.to_string(), name.to_string()));
            Ok(())
        })
    }
}

fn orchestrator(mock: &Arc<MockBackend>) -> Orchestrator {
    Orchestrator::new(
        Arc::clone(mock) as Arc<dyn RepoBackend>,
        Arc::clone(mock) as Arc<dyn RepoBackend>,
        Arc::new(LogOnlyLoader),
    )
    .with_identifiers(IdentifierSource::new(|| RFC_ID.to_string()))
    .with_poll_config(PollConfig {
        max_attempts: 3,
        wait: Duration::ZERO,
    })
}

fn add_action(name: &str) -> Action {
    Action::new(
        ActionType::Add,
        Some(Target {
            target_type: TargetType::Item,
            target_descriptor: "EntityType".to_string(),
            lookup_key: "name".to_string(),
            lookup_value: name.to_string(),
        }),
    )
    .with_data("name", name)
}

fn draft_rfc(names: &[&str]) -> Rfc {
    Rfc {
        actions: names.iter().map(|n| add_action(n)).collect(),
        ..Rfc::default()
    }
}

fn signed_rfc(names: &[&str]) -> Rfc {
    let mut rfc = draft_rfc(names);
    rfc.identifier = RFC_ID.to_string();
    rfc.sign_actions().unwrap();
    rfc.refresh_signature().unwrap();
    rfc
}

// === Submission ===

#[tokio::test]
async fn submit_signs_everything_and_opens_review_request() {
    let mock = MockBackend::new();
    let identifier = orchestrator(&mock)
        .submit(draft_rfc(&["Account", "Holding"]))
        .await
        .unwrap();

    assert_eq!(identifier, RFC_ID);
    mock.with(|s| {
        assert!(s.branches.contains(&RFC_ID.to_string()));
        assert!(s.requests.contains_key(RFC_ID));
    });

    let stored = mock.stored_rfc(RFC_ID);
    assert_eq!(stored.identifier, RFC_ID);
    assert!(!stored.signature.is_empty());
    assert_eq!(stored.actions.len(), 2);
    for action in &stored.actions {
        assert_eq!(action.signature, action.content_signature().unwrap());
    }
    assert_eq!(stored.signature, stored.content_signature().unwrap());
}

#[tokio::test]
async fn failed_artifact_write_revokes_workspace_and_returns_original_error() {
    let mock = MockBackend::new();
    mock.with(|s| s.fail_create_file = true);

    let err = orchestrator(&mock)
        .submit(draft_rfc(&["Account"]))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Backend(_)));
    assert!(err.to_string().contains("injected write failure"));
    mock.with(|s| {
        assert!(s.branches.is_empty(), "workspace branch must be revoked");
        assert!(s.calls.contains(&"delete_branch"));
        assert!(!s.calls.contains(&"open_review_request"));
    });
}

#[tokio::test]
async fn failed_review_request_open_also_revokes_workspace() {
    let mock = MockBackend::new();
    mock.with(|s| s.fail_open_request = true);

    let err = orchestrator(&mock)
        .submit(draft_rfc(&["Account"]))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("injected open failure"));
    mock.with(|s| assert!(s.branches.is_empty()));
}

// === Update ===

#[tokio::test]
async fn update_carries_comments_and_dismisses_approvals() {
    let mock = MockBackend::new();
    let mut original = signed_rfc(&["Account"]);
    let comment = Action::new(
        ActionType::Comment,
        Some(Target::by_signature(
            TargetType::Rfc,
            original.signature.clone(),
        )),
    )
    .with_data(COMMENT_KEY, "looks odd")
    .with_data(COMMENTER_KEY, "reviewer1");
    original.append_action(comment).unwrap();
    let carried_signature = original.actions[1].signature.clone();
    mock.seed(RFC_ID, &original);
    mock.with(|s| {
        s.reviews = vec![
            Review {
                id: 7,
                verdict: ReviewVerdict::Approved,
                reviewer: Some("reviewer1".to_string()),
            },
            Review {
                id: 8,
                verdict: ReviewVerdict::Commented,
                reviewer: Some("reviewer2".to_string()),
            },
        ];
    });

    orchestrator(&mock)
        .update(RFC_ID, draft_rfc(&["Account", "Portfolio"]))
        .await
        .unwrap();

    let stored = mock.stored_rfc(RFC_ID);
    assert_eq!(stored.actions.len(), 3, "two new adds plus carried comment");
    let carried = stored
        .actions
        .iter()
        .find(|a| a.action_type == ActionType::Comment)
        .unwrap();
    assert_eq!(carried.signature, carried_signature);
    assert_eq!(stored.signature, stored.content_signature().unwrap());

    mock.with(|s| assert_eq!(s.dismissed, vec![7], "only the approval is dismissed"));
}

#[tokio::test]
async fn repeated_update_does_not_duplicate_carried_comments() {
    let mock = MockBackend::new();
    let mut original = signed_rfc(&["Account"]);
    let comment = Action::new(
        ActionType::Comment,
        Some(Target::by_signature(
            TargetType::Rfc,
            original.signature.clone(),
        )),
    )
    .with_data(COMMENT_KEY, "keep me")
    .with_data(COMMENTER_KEY, "reviewer1");
    original.append_action(comment).unwrap();
    let comment_signature = original.actions[1].signature.clone();
    mock.seed(RFC_ID, &original);

    let orchestrator = orchestrator(&mock);
    orchestrator
        .update(RFC_ID, draft_rfc(&["Account", "Portfolio"]))
        .await
        .unwrap();
    orchestrator
        .update(RFC_ID, draft_rfc(&["Account", "Portfolio"]))
        .await
        .unwrap();

    let stored = mock.stored_rfc(RFC_ID);
    let comments: Vec<&Action> = stored
        .actions
        .iter()
        .filter(|a| a.action_type == ActionType::Comment)
        .collect();
    assert_eq!(comments.len(), 1, "carryover must not duplicate comments");
    assert_eq!(comments[0].signature, comment_signature);

    // Each update replaces the non-comment actions wholesale.
    let adds = stored
        .actions
        .iter()
        .filter(|a| a.action_type == ActionType::Add)
        .count();
    assert_eq!(adds, 2);
    assert_eq!(stored.signature, stored.content_signature().unwrap());
}

#[tokio::test]
async fn update_persist_failure_propagates_and_skips_dismissal() {
    let mock = MockBackend::new();
    let mut original = signed_rfc(&["Account"]);
    let comment = Action::new(
        ActionType::Comment,
        Some(Target::by_signature(
            TargetType::Rfc,
            original.signature.clone(),
        )),
    )
    .with_data(COMMENT_KEY, "still relevant")
    .with_data(COMMENTER_KEY, "reviewer1");
    original.append_action(comment).unwrap();
    let comment_signature = original.actions[1].signature.clone();
    mock.seed(RFC_ID, &original);
    mock.with(|s| s.fail_update_file = true);

    let err = orchestrator(&mock)
        .update(RFC_ID, draft_rfc(&["Portfolio"]))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("injected update failure"));
    mock.with(|s| assert!(!s.calls.contains(&"dismiss_approvals")));

    // Carryover and re-signing were complete before the failing persist:
    // the attempted write already held the carried comment and a signature
    // matching the new content.
    let attempted: Rfc = mock.with(|s| serde_json::from_str(&s.attempted_writes[0]).unwrap());
    let carried = attempted
        .actions
        .iter()
        .find(|a| a.action_type == ActionType::Comment)
        .unwrap();
    assert_eq!(carried.signature, comment_signature);
    assert_eq!(attempted.signature, attempted.content_signature().unwrap());
    assert_ne!(attempted.signature, original.signature);
}

#[tokio::test]
async fn update_of_malformed_artifact_is_a_client_error() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));
    mock.with(|s| {
        s.files.insert(RFC_ID.to_string(), "not json".to_string());
    });

    let err = orchestrator(&mock)
        .update(RFC_ID, draft_rfc(&["Portfolio"]))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::MalformedArtifact { .. }));
}

// === Review ===

#[tokio::test]
async fn comment_review_without_substance_is_rejected_before_any_backend_call() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));

    let err = orchestrator(&mock)
        .review(ReviewInput {
            identifier: RFC_ID.to_string(),
            kind: ReviewKind::Comment,
            top_level_comment: None,
            comments: BTreeMap::new(),
            load_on_approval: false,
        })
        .await
        .unwrap_err();

    assert!(err.is_validation());
    mock.with(|s| assert!(s.calls.is_empty(), "no backend call before validation"));
}

#[tokio::test]
async fn request_changes_without_substance_is_rejected() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));

    let err = orchestrator(&mock)
        .review(ReviewInput {
            identifier: RFC_ID.to_string(),
            kind: ReviewKind::RequestChanges,
            top_level_comment: Some(String::new()),
            comments: BTreeMap::new(),
            load_on_approval: false,
        })
        .await
        .unwrap_err();

    assert!(err.is_validation());
}

#[tokio::test]
async fn approval_records_reviewer_action_against_reviewed_signature() {
    let mock = MockBackend::new();
    let original = signed_rfc(&["Account"]);
    let reviewed_signature = original.signature.clone();
    mock.seed(RFC_ID, &original);

    orchestrator(&mock)
        .review(ReviewInput {
            identifier: RFC_ID.to_string(),
            kind: ReviewKind::Approve,
            top_level_comment: Some("ship it".to_string()),
            comments: BTreeMap::new(),
            load_on_approval: false,
        })
        .await
        .unwrap();

    let stored = mock.stored_rfc(RFC_ID);
    let approval = stored
        .actions
        .iter()
        .find(|a| a.action_type == ActionType::Approve)
        .unwrap();
    assert_eq!(
        approval.data.get(REVIEWER_KEY).and_then(|v| v.as_str()),
        Some(LOGIN)
    );
    assert_eq!(
        approval.data.get(COMMENT_KEY).and_then(|v| v.as_str()),
        Some("ship it")
    );
    let target = approval.target.as_ref().unwrap();
    assert_eq!(target.target_type, TargetType::Rfc);
    assert_eq!(target.lookup_value, reviewed_signature);

    // Appending the approval re-signs the RFC.
    assert_ne!(stored.signature, reviewed_signature);
    assert_eq!(stored.signature, stored.content_signature().unwrap());

    mock.with(|s| {
        assert_eq!(s.submitted_reviews.len(), 1);
        assert_eq!(s.submitted_reviews[0].kind, ReviewKind::Approve);
    });
}

#[tokio::test]
async fn inline_comments_attach_to_actions_and_dangling_targets_fall_back_to_rfc() {
    let mock = MockBackend::new();
    let original = signed_rfc(&["Account"]);
    let action_signature = original.actions[0].signature.clone();
    mock.seed(RFC_ID, &original);

    let mut comments = BTreeMap::new();
    comments.insert(action_signature.clone(), vec!["rename this".to_string()]);
    comments.insert("deadbeef".to_string(), vec!["lost comment".to_string()]);

    orchestrator(&mock)
        .review(ReviewInput {
            identifier: RFC_ID.to_string(),
            kind: ReviewKind::Comment,
            top_level_comment: None,
            comments,
            load_on_approval: false,
        })
        .await
        .unwrap();

    let stored = mock.stored_rfc(RFC_ID);
    let comments: Vec<&Action> = stored
        .actions
        .iter()
        .filter(|a| a.action_type == ActionType::Comment)
        .collect();
    assert_eq!(comments.len(), 2, "dangling comment is kept, not dropped");

    let on_action = comments
        .iter()
        .find(|a| a.target.as_ref().unwrap().target_type == TargetType::Action)
        .unwrap();
    assert_eq!(on_action.target.as_ref().unwrap().lookup_value, action_signature);
    assert_eq!(
        on_action.data.get(COMMENTER_KEY).and_then(|v| v.as_str()),
        Some(LOGIN)
    );

    let dangling = comments
        .iter()
        .find(|a| a.target.as_ref().unwrap().target_type == TargetType::Rfc)
        .unwrap();
    assert!(dangling
        .data
        .get(NOTE_KEY)
        .and_then(|v| v.as_str())
        .unwrap()
        .contains("deadbeef"));
}

// === Mergeability poller ===

#[tokio::test]
async fn pending_checks_then_clean_state_is_mergeable() {
    let mock = MockBackend::new();
    let original = signed_rfc(&["Account"]);
    mock.seed(RFC_ID, &original);
    mock.with(|s| {
        s.check_states = VecDeque::from([CheckState::Pending, CheckState::Success]);
        s.merge_states = VecDeque::from([Some(MergeState::Unknown), Some(MergeState::Clean)]);
    });

    let request = mock.review_request(RFC_ID).await.unwrap();
    let config = PollConfig {
        max_attempts: 3,
        wait: Duration::ZERO,
    };
    let verdict = resolve_mergeability(mock.as_ref(), &request, &config)
        .await
        .unwrap();

    assert!(verdict);
    mock.with(|s| {
        let checks = s.calls.iter().filter(|c| **c == "combined_check_state").count();
        assert_eq!(checks, 2, "stops polling checks once they settle");
    });
}

#[tokio::test]
async fn dirty_state_is_a_not_mergeable_verdict() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));
    mock.with(|s| {
        s.merge_states = VecDeque::from([Some(MergeState::Dirty)]);
    });

    let request = mock.review_request(RFC_ID).await.unwrap();
    let config = PollConfig {
        max_attempts: 3,
        wait: Duration::ZERO,
    };
    let verdict = resolve_mergeability(mock.as_ref(), &request, &config)
        .await
        .unwrap();
    assert!(!verdict);
}

#[tokio::test]
async fn exhausted_unknown_state_is_an_error_not_a_verdict() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));
    mock.with(|s| {
        s.merge_states = VecDeque::from([
            Some(MergeState::Unknown),
            Some(MergeState::Unknown),
            Some(MergeState::Unknown),
        ]);
    });

    let request = mock.review_request(RFC_ID).await.unwrap();
    let config = PollConfig {
        max_attempts: 3,
        wait: Duration::ZERO,
    };
    let err = resolve_mergeability(mock.as_ref(), &request, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::MergeabilityUndetermined(_)));
    mock.with(|s| {
        let refreshes = s
            .calls
            .iter()
            .filter(|c| **c == "refresh_review_request")
            .count();
        assert_eq!(refreshes, 3, "retry budget is bounded");
    });
}

// === Load & merge ===

#[tokio::test]
async fn load_request_persists_status_transitions_through_successful() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));

    orchestrator(&mock).request_load(RFC_ID).await.unwrap();

    // The load itself runs on a detached task.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stored = mock.stored_rfc(RFC_ID);
    assert_eq!(stored.current_load_status(), Some("successful"));
    let loads = stored
        .actions
        .iter()
        .filter(|a| a.action_type == ActionType::Load)
        .count();
    assert_eq!(loads, 1, "status transitions overwrite one load action");
    assert_eq!(stored.signature, stored.content_signature().unwrap());
}

#[tokio::test]
async fn status_reports_the_recorded_load_status() {
    let mock = MockBackend::new();
    let mut rfc = signed_rfc(&["Account"]);
    rfc.upsert_load_status(accord_core::LoadStatus::Loading, LOGIN)
        .unwrap();
    rfc.refresh_signature().unwrap();
    mock.seed(RFC_ID, &rfc);

    let status = orchestrator(&mock).status(RFC_ID).await.unwrap();
    assert_eq!(status.as_deref(), Some("loading"));
}

#[tokio::test]
async fn status_is_none_when_no_load_was_ever_requested() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));

    let status = orchestrator(&mock).status(RFC_ID).await.unwrap();
    assert_eq!(status, None);
}

#[tokio::test]
async fn merge_tags_the_merge_commit_with_the_rfc_identifier() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));

    orchestrator(&mock).merge(RFC_ID).await.unwrap();

    mock.with(|s| {
        assert_eq!(s.merged, vec![RFC_ID.to_string()]);
        assert_eq!(s.tags, vec![("abc123sha".to_string(), RFC_ID.to_string())]);
    });
}

#[tokio::test]
async fn approval_with_load_request_runs_the_full_pipeline() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));

    let message = orchestrator(&mock)
        .review(ReviewInput {
            identifier: RFC_ID.to_string(),
            kind: ReviewKind::Approve,
            top_level_comment: None,
            comments: BTreeMap::new(),
            load_on_approval: true,
        })
        .await
        .unwrap();
    assert!(message.contains("load requested"));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let stored = mock.stored_rfc(RFC_ID);
    assert_eq!(stored.current_load_status(), Some("successful"));
    mock.with(|s| {
        assert_eq!(s.merged, vec![RFC_ID.to_string()]);
        assert_eq!(s.tags.len(), 1);
    });
}

#[tokio::test]
async fn unmergeable_rfc_closes_the_load_as_not_applicable_without_merging() {
    let mock = MockBackend::new();
    mock.seed(RFC_ID, &signed_rfc(&["Account"]));
    mock.with(|s| {
        // Every refresh reports a dirty tree.
        s.merge_states = VecDeque::from(vec![Some(MergeState::Dirty); 6]);
    });

    orchestrator(&mock)
        .review(ReviewInput {
            identifier: RFC_ID.to_string(),
            kind: ReviewKind::Approve,
            top_level_comment: None,
            comments: BTreeMap::new(),
            load_on_approval: true,
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let stored = mock.stored_rfc(RFC_ID);
    assert_eq!(stored.current_load_status(), Some("not_applicable"));
    mock.with(|s| {
        assert!(s.merged.is_empty(), "no merge for an unmergeable RFC");
        assert!(s.tags.is_empty());
    });
}

// === Listing ===

#[tokio::test]
async fn listing_maps_branches_to_identifiers() {
    let mock = MockBackend::new();
    mock.seed("1700000000", &signed_rfc(&["Account"]));
    mock.seed("1700000001", &signed_rfc(&["Holding"]));

    let rfcs = orchestrator(&mock)
        .list(&ListQuery::default())
        .await
        .unwrap();

    assert_eq!(rfcs.len(), 2);
    assert_eq!(rfcs[0].identifier, "1700000000");
    assert_eq!(rfcs[1].identifier, "1700000001");
    assert!(rfcs[0].title.contains("1700000000"));
}
